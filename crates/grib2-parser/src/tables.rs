//! Short names for the GRIB2 codes that show up in HRRR surface files.
//!
//! Used for log lines and error messages only; field selection always goes
//! through numeric codes.

/// Parameter short name for (discipline, category, number), NCEP conventions.
pub fn parameter_short_name(discipline: u8, category: u8, number: u8) -> String {
    let name = match (discipline, category, number) {
        // Temperature
        (0, 0, 0) => "TMP",
        (0, 0, 6) => "DPT",
        // Moisture
        (0, 1, 1) => "RH",
        (0, 1, 8) => "APCP",
        // Momentum
        (0, 2, 2) => "UGRD",
        (0, 2, 3) => "VGRD",
        (0, 2, 22) => "GUST",
        // Mass
        (0, 3, 0) => "PRES",
        (0, 3, 1) => "PRMSL",
        (0, 3, 5) => "HGT",
        (0, 3, 198) => "MSLMA",
        // Cloud
        (0, 6, 1) => "TCDC",
        // Stability
        (0, 7, 6) => "CAPE",
        (0, 7, 7) => "CIN",
        // Forecast radar imagery
        (0, 16, 195) => "REFD",
        (0, 16, 196) => "REFC",
        (0, 16, 197) => "RETOP",
        // Physical atmospheric properties
        (0, 19, 0) => "VIS",
        _ => return format!("P{}_{}_{}", discipline, category, number),
    };
    name.to_string()
}

/// Description of a fixed surface (Code Table 4.5).
pub fn surface_description(surface_type: u8, value: Option<f64>) -> String {
    let value = value.unwrap_or(0.0);
    match surface_type {
        1 => "surface".to_string(),
        10 => "entire atmosphere".to_string(),
        100 => format!("{} mb", value / 100.0),
        101 => "mean sea level".to_string(),
        103 => format!("{} m above ground", value),
        200 => "entire atmosphere (single layer)".to_string(),
        other => format!("level type {} value {}", other, value),
    }
}
