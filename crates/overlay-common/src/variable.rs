//! Declarative description of a rendered model variable.
//!
//! A [`VariableSpec`] carries everything the pipeline needs to fetch, decode,
//! color and publish one HRRR field: the NOMADS filter codes, the GRIB2
//! identifiers used to pick the field out of the payload, the palette, the
//! unit conversion and where the PNGs end up. Adding a variable is a config
//! change only.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// GRIB2 identifiers used to select one field from a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelector {
    /// Section 0 discipline (0 = meteorological products)
    #[serde(default)]
    pub discipline: u8,
    /// Section 4 parameter category
    pub category: u8,
    /// Section 4 parameter number
    pub number: u8,
    /// Type of first fixed surface (Code Table 4.5)
    pub surface_type: u8,
    /// Value of the first fixed surface, when it matters (e.g. 2 for 2 m above ground)
    #[serde(default)]
    pub surface_value: Option<f64>,
}

/// Unit conversion applied to decoded values before coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitTransform {
    #[default]
    Identity,
    KelvinToCelsius,
    PascalToHectopascal,
}

impl UnitTransform {
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        match self {
            UnitTransform::Identity => value,
            UnitTransform::KelvinToCelsius => value - 273.15,
            UnitTransform::PascalToHectopascal => value / 100.0,
        }
    }
}

/// A palette stop: values at `value` get `color`, values between two stops are
/// linearly interpolated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub value: f32,
    /// `#RRGGBB` or `#RRGGBBAA`
    pub color: String,
}

impl ColorStop {
    pub fn new(value: f32, color: &str) -> Self {
        Self {
            value,
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteSpec {
    /// Stops in strictly ascending value order
    pub stops: Vec<ColorStop>,
    /// Values (after the unit transform) below this threshold are left transparent
    #[serde(default)]
    pub transparent_below: Option<f32>,
}

/// One rendered variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Human-readable name used in logs and run reports
    pub name: String,
    /// Key used for this variable in the combined hour index
    pub key: String,
    /// NOMADS filter variable code (`var_<code>=on`)
    pub grib_code: String,
    /// NOMADS filter level (`lev_<level>=on`)
    pub level: String,
    pub selector: FieldSelector,
    #[serde(default)]
    pub transform: UnitTransform,
    pub palette: PaletteSpec,
    /// Output subdirectory below the static root
    pub output_dir: String,
    /// URL path the output directory is served under (e.g. `/pngs`)
    pub url_prefix: String,
    /// PNG filename prefix: files are named `<file_prefix>_<step:02>.png`
    pub file_prefix: String,
}

impl VariableSpec {
    /// Output filename for a forecast step.
    pub fn filename(&self, step: u32) -> String {
        format!("{}_{:02}.png", self.file_prefix, step)
    }

    /// Public URL of a file in this variable's output directory.
    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{}", self.url_prefix.trim_end_matches('/'), filename)
    }

    /// Extract the forecast hour embedded in an output filename.
    ///
    /// Only names of the exact form `<file_prefix>_<digits>.png` match.
    pub fn parse_hour(&self, filename: &str) -> Option<u32> {
        let digits = filename
            .strip_prefix(self.file_prefix.as_str())?
            .strip_prefix('_')?
            .strip_suffix(".png")?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let fail = |msg: &str| Err(ConfigError::variable(&self.name, msg));

        if self.name.trim().is_empty() {
            return Err(ConfigError::variable("<unnamed>", "name must not be empty"));
        }
        if self.key.trim().is_empty() {
            return fail("key must not be empty");
        }
        if self.grib_code.trim().is_empty() || self.level.trim().is_empty() {
            return fail("grib_code and level are required");
        }
        if self.file_prefix.is_empty() || self.file_prefix.contains(['/', '\\']) {
            return fail("file_prefix must be a plain, non-empty name");
        }
        if self.output_dir.is_empty() || self.output_dir.contains("..") {
            return fail("output_dir must be a relative path without '..'");
        }
        if !self.url_prefix.starts_with('/') || self.url_prefix.trim_end_matches('/').is_empty() {
            return fail("url_prefix must start with '/' and name a path");
        }
        if self.palette.stops.is_empty() {
            return fail("palette needs at least one stop");
        }
        if self
            .palette
            .stops
            .windows(2)
            .any(|pair| pair[0].value >= pair[1].value)
        {
            return fail("palette stops must be in strictly ascending order");
        }
        Ok(())
    }

    /// Composite reflectivity (dBZ), served from `/pngs` where the map page looks for it.
    pub fn reflectivity() -> Self {
        Self {
            name: "reflectivity".to_string(),
            key: "refc".to_string(),
            grib_code: "REFC".to_string(),
            level: "entire_atmosphere".to_string(),
            selector: FieldSelector {
                discipline: 0,
                category: 16,
                number: 196,
                surface_type: 10,
                surface_value: None,
            },
            transform: UnitTransform::Identity,
            palette: PaletteSpec {
                stops: vec![
                    ColorStop::new(5.0, "#04e9e7"),
                    ColorStop::new(10.0, "#019ff4"),
                    ColorStop::new(15.0, "#0300f4"),
                    ColorStop::new(20.0, "#02fd02"),
                    ColorStop::new(25.0, "#01c501"),
                    ColorStop::new(30.0, "#008e00"),
                    ColorStop::new(35.0, "#fdf802"),
                    ColorStop::new(40.0, "#e5bc00"),
                    ColorStop::new(45.0, "#fd9500"),
                    ColorStop::new(50.0, "#fd0000"),
                    ColorStop::new(55.0, "#d40000"),
                    ColorStop::new(60.0, "#bc0000"),
                    ColorStop::new(65.0, "#f800fd"),
                    ColorStop::new(70.0, "#9854c6"),
                ],
                transparent_below: Some(5.0),
            },
            output_dir: "pngs".to_string(),
            url_prefix: "/pngs".to_string(),
            file_prefix: "reflectivity".to_string(),
        }
    }

    /// MSLP (MAPS reduction), converted to hPa, diverging palette around 1013 hPa.
    pub fn mean_sea_level_pressure() -> Self {
        Self {
            name: "mean-sea-level-pressure".to_string(),
            key: "mslp".to_string(),
            grib_code: "MSLMA".to_string(),
            level: "mean_sea_level".to_string(),
            selector: FieldSelector {
                discipline: 0,
                category: 3,
                number: 198,
                surface_type: 101,
                surface_value: None,
            },
            transform: UnitTransform::PascalToHectopascal,
            palette: PaletteSpec {
                stops: vec![
                    ColorStop::new(970.0, "#2c7bb6"),
                    ColorStop::new(995.0, "#abd9e9"),
                    ColorStop::new(1013.0, "#ffffbf"),
                    ColorStop::new(1030.0, "#fdae61"),
                    ColorStop::new(1050.0, "#d7191c"),
                ],
                transparent_below: None,
            },
            output_dir: "MSLP".to_string(),
            url_prefix: "/MSLP_pngs".to_string(),
            file_prefix: "mslp".to_string(),
        }
    }

    /// 2 m temperature, converted to Celsius.
    pub fn temperature_2m() -> Self {
        Self {
            name: "2m-temperature".to_string(),
            key: "temp2m".to_string(),
            grib_code: "TMP".to_string(),
            level: "2_m_above_ground".to_string(),
            selector: FieldSelector {
                discipline: 0,
                category: 0,
                number: 0,
                surface_type: 103,
                surface_value: Some(2.0),
            },
            transform: UnitTransform::KelvinToCelsius,
            palette: PaletteSpec {
                stops: vec![
                    ColorStop::new(-30.0, "#00008b"),
                    ColorStop::new(-15.0, "#0000ff"),
                    ColorStop::new(0.0, "#add8e6"),
                    ColorStop::new(10.0, "#008000"),
                    ColorStop::new(20.0, "#ffff00"),
                    ColorStop::new(30.0, "#ffa500"),
                    ColorStop::new(40.0, "#ff0000"),
                ],
                transparent_below: None,
            },
            output_dir: "2mtemp".to_string(),
            url_prefix: "/2mtemp_pngs".to_string(),
            file_prefix: "2mtemp".to_string(),
        }
    }
}

/// The three variables published by default.
pub fn default_variables() -> Vec<VariableSpec> {
    vec![
        VariableSpec::reflectivity(),
        VariableSpec::mean_sea_level_pressure(),
        VariableSpec::temperature_2m(),
    ]
}
