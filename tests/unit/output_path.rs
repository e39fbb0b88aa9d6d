use comtrade_downloader::output::{default_artifact_name, resolve_artifact_path, slice_marker_path};
use comtrade_downloader::{AreaCatalogs, TradeQuery};
use std::path::{Path, PathBuf};

#[test]
fn test_extension_appended_only_when_missing() {
    assert_eq!(resolve_artifact_path("out/usa"), PathBuf::from("out/usa.csv"));
    assert_eq!(resolve_artifact_path("out/usa.csv"), PathBuf::from("out/usa.csv"));
    assert_eq!(resolve_artifact_path("out/usa.txt"), PathBuf::from("out/usa.txt"));
    // A dot in a directory name is not an extension
    assert_eq!(resolve_artifact_path("v1.2/usa"), PathBuf::from("v1.2/usa.csv"));
}

#[test]
fn test_markers_are_distinct_per_slice() {
    let artifact = Path::new("data/batch.csv");
    let markers: Vec<PathBuf> = (0..4).map(|i| slice_marker_path(artifact, i, 4)).collect();

    assert_eq!(markers[0], PathBuf::from("data/batch.slice-0.csv"));
    assert_eq!(markers[3], PathBuf::from("data/batch.slice-3.csv"));
    for (i, a) in markers.iter().enumerate() {
        assert_ne!(a, artifact);
        for b in &markers[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_single_slice_marker_is_artifact() {
    let artifact = Path::new("data/usa.csv");
    assert_eq!(slice_marker_path(artifact, 0, 1), artifact);
}

#[test]
fn test_default_name_follows_query() {
    let params = TradeQuery::new("842", "all", "2016-2017")
        .normalize(&AreaCatalogs::default())
        .unwrap();
    assert_eq!(
        default_artifact_name(&params),
        "comtrade_r842_pall_ps2016-2017_ccTOTAL_rg2.csv"
    );
}

#[test]
fn test_default_name_abbreviates_long_lists() {
    let params = TradeQuery::new(["1", "2", "3", "4", "5", "6"], "0", "2017")
        .with_tradeflow("imports")
        .normalize(&AreaCatalogs::default())
        .unwrap();
    assert_eq!(
        default_artifact_name(&params),
        "comtrade_r1-2-3+3_p0_ps2017_ccTOTAL_rg1.csv"
    );
}

#[test]
fn test_default_name_is_single_component() {
    let params = TradeQuery::new("842", "0", "2017")
        .with_product("../etc/passwd")
        .normalize(&AreaCatalogs::default())
        .unwrap();
    let name = default_artifact_name(&params);
    assert!(!name.contains('/'));
    assert!(!name.contains(".."));
}
