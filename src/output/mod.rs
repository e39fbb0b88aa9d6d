//! Artifact output: the combined CSV, empty-slice markers and path rules

use std::fs::File;
use std::path::Path;
use tracing::debug;

pub mod csv;
pub mod path;

pub use self::csv::{collect_columns, read_records_csv, write_records_csv, CsvRecordWriter};
pub use path::{default_artifact_name, resolve_artifact_path, slice_marker_path};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to disk
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn close(self) -> OutputResult<()>;
}

/// Create the zero-byte file that records "attempted, came back empty".
///
/// An existing marker is left untouched.
pub fn write_empty_marker(path: &Path) -> OutputResult<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
    }
    File::create(path)
        .map_err(|e| OutputError::IoError(format!("Failed to create marker: {e}")))?;
    debug!(path = %path.display(), "Empty marker written");
    Ok(())
}
