//! Artifact and marker path rules
//!
//! - The artifact path gets a `.csv` extension when it has none.
//! - A single-slice plan uses the artifact path itself as its marker.
//! - A multi-slice plan marks slice `i` with `<stem>.slice-<i>.<ext>` next to
//!   the artifact.

use crate::{QueryParameters, Selection};
use std::path::{Path, PathBuf};

/// Extension appended to artifact paths that have none
pub const DEFAULT_EXTENSION: &str = "csv";

/// Codes listed verbatim in a generated file name before abbreviating
const NAME_CODES_LIMIT: usize = 3;

/// Append `.csv` when `target` has no extension
pub fn resolve_artifact_path<P: AsRef<Path>>(target: P) -> PathBuf {
    let target = target.as_ref();
    if target.extension().is_some() {
        target.to_path_buf()
    } else {
        let mut name = target.as_os_str().to_owned();
        name.push(".");
        name.push(DEFAULT_EXTENSION);
        PathBuf::from(name)
    }
}

/// Marker path for slice `index` of a plan with `total` slices
pub fn slice_marker_path(artifact: &Path, index: usize, total: usize) -> PathBuf {
    if total <= 1 {
        return artifact.to_path_buf();
    }

    let stem = artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = artifact
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    artifact.with_file_name(format!("{stem}.slice-{index}.{extension}"))
}

/// File name derived from the query, used when no output path is given.
///
/// e.g. `comtrade_r842_pall_ps2016-2017_ccTOTAL_rg2.csv`
pub fn default_artifact_name(params: &QueryParameters) -> String {
    let name = format!(
        "comtrade_r{}_p{}_ps{}_cc{}_rg{}.{}",
        name_part(&params.reporter),
        name_part(&params.partner),
        name_part(&params.period),
        name_part(&params.product),
        params.tradeflow,
        DEFAULT_EXTENSION
    );
    sanitize_file_name(&name)
}

fn name_part(selection: &Selection) -> String {
    match selection {
        Selection::All => crate::WILDCARD.to_string(),
        Selection::Codes(codes) if codes.len() > NAME_CODES_LIMIT => format!(
            "{}+{}",
            codes[..NAME_CODES_LIMIT].join("-"),
            codes.len() - NAME_CODES_LIMIT
        ),
        Selection::Codes(codes) => codes.join("-"),
    }
}

/// Replace path separators and parent references so the name stays a single
/// component
fn sanitize_file_name(name: &str) -> String {
    name.replace("..", "__").replace(['/', '\\', ':', ' '], "_")
}
