//! Hour index built from published output directories.

use overlay_common::VariableSpec;
use pipeline::index::{list_hours, single_index};
use pipeline::{build_index, HourIndex, IndexLayout, Pairing, PipelineConfig};
use test_utils::TestRoot;

fn combined(pairing: Pairing) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.index.layout = IndexLayout::Combined;
    config.index.pairing = pairing;
    config
}

#[tokio::test]
async fn test_hours_sorted_numerically() {
    let root = TestRoot::new();
    root.touch_all(
        "pngs",
        &[
            "reflectivity_3.png",
            "reflectivity_10.png",
            "reflectivity_01.png",
            "reflectivity_2.png",
        ],
    );

    let urls = single_index(&root.join("pngs"), &VariableSpec::reflectivity())
        .await
        .unwrap();
    assert_eq!(
        urls,
        vec![
            "/pngs/reflectivity_01.png",
            "/pngs/reflectivity_2.png",
            "/pngs/reflectivity_3.png",
            "/pngs/reflectivity_10.png",
        ]
    );
}

#[tokio::test]
async fn test_unrelated_files_ignored() {
    let root = TestRoot::new();
    root.touch_all(
        "pngs",
        &[
            "reflectivity_00.png",
            "reflectivity_xx.png",
            "reflectivity_01.png.partial",
            "mslp_00.png",
            "README",
        ],
    );
    std::fs::create_dir_all(root.join("pngs/reflectivity_05.png")).unwrap();

    let files = list_hours(&root.join("pngs"), &VariableSpec::reflectivity())
        .await
        .unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["reflectivity_00.png"]);
}

#[tokio::test]
async fn test_missing_directory_is_empty() {
    let root = TestRoot::new();
    let index = build_index(&PipelineConfig::default(), root.path())
        .await
        .unwrap();
    assert_eq!(index, HourIndex::Single(Vec::new()));
    assert_eq!(serde_json::to_string(&index).unwrap(), "[]");
}

#[tokio::test]
async fn test_single_layout_lists_primary_variable() {
    let root = TestRoot::new();
    root.touch_all("pngs", &["reflectivity_01.png", "reflectivity_00.png"]);
    root.touch_all("MSLP", &["mslp_00.png"]);

    let index = build_index(&PipelineConfig::default(), root.path())
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&index).unwrap(),
        serde_json::json!(["/pngs/reflectivity_00.png", "/pngs/reflectivity_01.png"])
    );
}

#[tokio::test]
async fn test_combined_by_hour_joins_on_hour() {
    let root = TestRoot::new();
    root.touch_all(
        "pngs",
        &["reflectivity_00.png", "reflectivity_01.png", "reflectivity_02.png"],
    );
    root.touch_all("MSLP", &["mslp_00.png", "mslp_02.png"]);
    root.touch_all("2mtemp", &["2mtemp_00.png", "2mtemp_01.png", "2mtemp_02.png"]);

    let index = build_index(&combined(Pairing::ByHour), root.path())
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&index).unwrap(),
        serde_json::json!([
            {
                "hour": 0,
                "refc": "/pngs/reflectivity_00.png",
                "mslp": "/MSLP_pngs/mslp_00.png",
                "temp2m": "/2mtemp_pngs/2mtemp_00.png"
            },
            {
                "hour": 2,
                "refc": "/pngs/reflectivity_02.png",
                "mslp": "/MSLP_pngs/mslp_02.png",
                "temp2m": "/2mtemp_pngs/2mtemp_02.png"
            }
        ])
    );
}

#[tokio::test]
async fn test_combined_positional_truncates_to_shortest() {
    let root = TestRoot::new();
    root.touch_all(
        "pngs",
        &["reflectivity_00.png", "reflectivity_01.png", "reflectivity_02.png"],
    );
    root.touch_all("MSLP", &["mslp_00.png", "mslp_02.png"]);
    root.touch_all("2mtemp", &["2mtemp_00.png", "2mtemp_01.png", "2mtemp_02.png"]);

    let index = build_index(&combined(Pairing::Positional), root.path())
        .await
        .unwrap();
    let HourIndex::Combined(entries) = index else {
        panic!("expected combined index");
    };

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].hour, 1);
    assert_eq!(entries[1].urls["refc"], "/pngs/reflectivity_01.png");
    assert_eq!(entries[1].urls["mslp"], "/MSLP_pngs/mslp_02.png");
}

#[tokio::test]
async fn test_hours_three_one_two() {
    let root = TestRoot::new();
    root.touch_all(
        "static/pngs",
        &["reflectivity_3.png", "reflectivity_1.png", "reflectivity_2.png"],
    );

    let index = build_index(&PipelineConfig::default(), &root.join("static"))
        .await
        .unwrap();
    assert_eq!(
        index,
        HourIndex::Single(vec![
            "/pngs/reflectivity_1.png".to_string(),
            "/pngs/reflectivity_2.png".to_string(),
            "/pngs/reflectivity_3.png".to_string(),
        ])
    );
}

#[tokio::test]
async fn test_positional_pairing_with_short_series() {
    let root = TestRoot::new();
    root.touch_all(
        "pngs",
        &["reflectivity_00.png", "reflectivity_01.png", "reflectivity_02.png"],
    );
    root.touch_all("MSLP", &["mslp_00.png", "mslp_01.png"]);
    root.touch_all("2mtemp", &["2mtemp_00.png", "2mtemp_01.png", "2mtemp_02.png"]);

    let index = build_index(&combined(Pairing::Positional), root.path())
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&index).unwrap(),
        serde_json::json!([
            {
                "hour": 0,
                "refc": "/pngs/reflectivity_00.png",
                "mslp": "/MSLP_pngs/mslp_00.png",
                "temp2m": "/2mtemp_pngs/2mtemp_00.png"
            },
            {
                "hour": 1,
                "refc": "/pngs/reflectivity_01.png",
                "mslp": "/MSLP_pngs/mslp_01.png",
                "temp2m": "/2mtemp_pngs/2mtemp_01.png"
            }
        ])
    );
}
