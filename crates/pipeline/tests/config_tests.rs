//! The shipped configuration file.

use std::path::PathBuf;

use pipeline::{PipelineConfig, PipelineError};
use test_utils::TestRoot;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/overlays.yaml")
}

#[test]
fn test_shipped_config_matches_defaults() {
    let config = PipelineConfig::load(shipped_config()).unwrap();
    assert_eq!(config, PipelineConfig::default());
}

#[test]
fn test_load_reports_parse_errors_with_path() {
    let root = TestRoot::new();
    let path = root.write("bad.yaml", "steps: [1, 2");

    match PipelineConfig::load(&path) {
        Err(PipelineError::ConfigParse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_load_rejects_invalid_palette() {
    let root = TestRoot::new();
    let path = root.write(
        "overlays.yaml",
        r##"
variables:
  - name: gust
    key: gust
    grib_code: GUST
    level: surface
    selector: { category: 2, number: 22, surface_type: 1 }
    palette:
      stops:
        - { value: 10, color: "#00ff00" }
        - { value: 5, color: "#ff0000" }
    output_dir: gust
    url_prefix: /gust_pngs
    file_prefix: gust
index:
  primary: gust
"##,
    );

    assert!(matches!(
        PipelineConfig::load(&path),
        Err(PipelineError::Config(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let root = TestRoot::new();
    assert!(matches!(
        PipelineConfig::load(root.join("absent.yaml")),
        Err(PipelineError::Io { .. })
    ));
}
