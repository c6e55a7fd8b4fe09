//! Tests for variable specs: filename parsing, URLs, validation, YAML shape.

use overlay_common::variable::{default_variables, ColorStop, VariableSpec};
use overlay_common::{ConfigError, UnitTransform};

// ============================================================================
// parse_hour tests
// ============================================================================

#[test]
fn test_parse_hour_matches_exact_pattern() {
    let spec = VariableSpec::reflectivity();
    assert_eq!(spec.parse_hour("reflectivity_00.png"), Some(0));
    assert_eq!(spec.parse_hour("reflectivity_07.png"), Some(7));
    assert_eq!(spec.parse_hour("reflectivity_48.png"), Some(48));
    // More digits than the writer produces still parse
    assert_eq!(spec.parse_hour("reflectivity_100.png"), Some(100));
}

#[test]
fn test_parse_hour_rejects_other_names() {
    let spec = VariableSpec::reflectivity();
    assert_eq!(spec.parse_hour("reflectivity_.png"), None);
    assert_eq!(spec.parse_hour("reflectivity_1a.png"), None);
    assert_eq!(spec.parse_hour("reflectivity_01.png.bak"), None);
    assert_eq!(spec.parse_hour("reflectivity01.png"), None);
    assert_eq!(spec.parse_hour("mslp_01.png"), None);
    assert_eq!(spec.parse_hour("xreflectivity_01.png"), None);
    assert_eq!(spec.parse_hour("reflectivity_+1.png"), None);
}

#[test]
fn test_filename_round_trips_through_parse_hour() {
    for spec in default_variables() {
        for step in [0, 5, 10, 48] {
            assert_eq!(spec.parse_hour(&spec.filename(step)), Some(step));
        }
    }
}

// ============================================================================
// URL tests
// ============================================================================

#[test]
fn test_url_for() {
    let spec = VariableSpec::reflectivity();
    assert_eq!(spec.url_for("reflectivity_03.png"), "/pngs/reflectivity_03.png");

    let mut trailing = VariableSpec::temperature_2m();
    trailing.url_prefix = "/2mtemp_pngs/".to_string();
    assert_eq!(trailing.url_for("2mtemp_03.png"), "/2mtemp_pngs/2mtemp_03.png");
}

// ============================================================================
// validate tests
// ============================================================================

#[test]
fn test_validate_rejects_unsorted_palette() {
    let mut spec = VariableSpec::temperature_2m();
    spec.palette.stops = vec![ColorStop::new(10.0, "#ff0000"), ColorStop::new(0.0, "#0000ff")];
    let err = spec.validate().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidVariable { .. }));
}

#[test]
fn test_validate_rejects_empty_palette() {
    let mut spec = VariableSpec::temperature_2m();
    spec.palette.stops.clear();
    assert!(spec.validate().is_err());
}

#[test]
fn test_validate_rejects_bad_paths() {
    let mut spec = VariableSpec::mean_sea_level_pressure();
    spec.output_dir = "../outside".to_string();
    assert!(spec.validate().is_err());

    let mut spec = VariableSpec::mean_sea_level_pressure();
    spec.url_prefix = "MSLP_pngs".to_string();
    assert!(spec.validate().is_err());

    let mut spec = VariableSpec::mean_sea_level_pressure();
    spec.url_prefix = "/".to_string();
    assert!(spec.validate().is_err());

    let mut spec = VariableSpec::mean_sea_level_pressure();
    spec.file_prefix = "a/b".to_string();
    assert!(spec.validate().is_err());
}

// ============================================================================
// Serialization tests
// ============================================================================

#[test]
fn test_variable_from_yaml() {
    let yaml = r##"
name: 2m-temperature
key: temp2m
grib_code: TMP
level: 2_m_above_ground
selector:
  category: 0
  number: 0
  surface_type: 103
  surface_value: 2
transform: kelvin_to_celsius
palette:
  stops:
    - { value: -30, color: "#00008b" }
    - { value: 40, color: "#ff0000" }
output_dir: 2mtemp
url_prefix: /2mtemp_pngs
file_prefix: 2mtemp
"##;

    let spec: VariableSpec = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(spec.transform, UnitTransform::KelvinToCelsius);
    assert_eq!(spec.selector.discipline, 0);
    assert_eq!(spec.selector.surface_value, Some(2.0));
    assert_eq!(spec.palette.transparent_below, None);
    assert_eq!(spec.palette.stops.len(), 2);
    spec.validate().unwrap();
}
