//! Pipeline configuration, loaded from `config/overlays.yaml`.
//!
//! Every section has defaults matching the shipped file, so a partial YAML
//! document only needs to list what it changes.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use overlay_common::cycle::{DEFAULT_CYCLE_INTERVAL_HOURS, DEFAULT_LAG_HOURS};
use overlay_common::{default_variables, ConfigError, ForecastCycle, GeoExtent, VariableSpec};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::index::{IndexLayout, Pairing};

/// NOMADS filter CGI for HRRR 2-D surface fields.
pub const NOMADS_HRRR_FILTER: &str = "https://nomads.ncep.noaa.gov/cgi-bin/filter_hrrr_2d.pl";

/// Longest forecast HRRR publishes (extended 6-hourly cycles).
pub const MAX_FORECAST_STEP: u32 = 48;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub cycle: CycleConfig,
    pub steps: StepRange,
    pub extent: GeoExtent,
    pub image: ImageSize,
    pub index: IndexConfig,
    pub variables: Vec<VariableSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            cycle: CycleConfig::default(),
            steps: StepRange::default(),
            extent: GeoExtent::conus(),
            image: ImageSize::default(),
            index: IndexConfig::default(),
            variables: default_variables(),
        }
    }
}

/// Upstream data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// NOMADS directory under `hrrr.YYYYMMDD/`
    pub region: String,
    /// Optional server-side crop
    pub subregion: Option<Subregion>,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: NOMADS_HRRR_FILTER.to_string(),
            region: "conus".to_string(),
            subregion: None,
            request_timeout_secs: 120,
            retry: RetryPolicy::default(),
        }
    }
}

impl SourceConfig {
    /// Filter URL for one variable of one forecast step.
    pub fn url_for(&self, cycle: &ForecastCycle, step: u32, variable: &VariableSpec) -> String {
        let mut url = format!(
            "{}?dir=%2Fhrrr.{}%2F{}&file={}&var_{}=on&lev_{}=on",
            self.base_url,
            cycle.date_str(),
            self.region,
            upstream_file_name(cycle, step),
            variable.grib_code,
            variable.level,
        );
        if let Some(sub) = &self.subregion {
            url.push_str(&format!(
                "&subregion=&toplat={}&leftlon={}&rightlon={}&bottomlat={}",
                sub.top_lat, sub.left_lon, sub.right_lon, sub.bottom_lat
            ));
        }
        url
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Name of the full HRRR surface file for `step` on the NOMADS server.
pub fn upstream_file_name(cycle: &ForecastCycle, step: u32) -> String {
    format!("hrrr.t{}z.wrfsfcf{:02}.grib2", cycle.hour_str(), step)
}

/// Bounds for the NOMADS `subregion` filter, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Subregion {
    pub top_lat: f64,
    pub left_lon: f64,
    pub right_lon: f64,
    pub bottom_lat: f64,
}

/// Bounded exponential backoff for transient upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling each time up to the cap.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(20);
        let ms = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// How to pick the model cycle for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Hours subtracted from "now" before flooring to a cycle
    pub lag_hours: i64,
    pub interval_hours: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            lag_hours: DEFAULT_LAG_HOURS,
            interval_hours: DEFAULT_CYCLE_INTERVAL_HOURS,
        }
    }
}

impl CycleConfig {
    pub fn latest(&self, now: chrono::DateTime<chrono::Utc>) -> ForecastCycle {
        ForecastCycle::latest_with(now, ChronoDuration::hours(self.lag_hours), self.interval_hours)
    }
}

/// Forecast steps to process, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepRange {
    pub first: u32,
    pub last: u32,
}

impl Default for StepRange {
    fn default() -> Self {
        Self {
            first: 0,
            last: MAX_FORECAST_STEP,
        }
    }
}

impl StepRange {
    pub fn iter(&self) -> std::ops::RangeInclusive<u32> {
        self.first..=self.last
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }
}

/// Output image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSize {
    pub width: usize,
    pub height: usize,
}

impl Default for ImageSize {
    fn default() -> Self {
        // 10 x 7 inches at 150 dpi
        Self {
            width: 1500,
            height: 1050,
        }
    }
}

/// Shape of the `/reflectivity_images` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub layout: IndexLayout,
    pub pairing: Pairing,
    /// Variable listed by the single-variable layout
    pub primary: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            layout: IndexLayout::default(),
            pairing: Pairing::default(),
            primary: "reflectivity".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config: PipelineConfig =
            serde_yaml::from_str(&contents).map_err(|source| PipelineError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;

        info!(
            path = %path.display(),
            variables = config.variables.len(),
            first_step = config.steps.first,
            last_step = config.steps.last,
            "Loaded pipeline configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_yaml::from_str(yaml).map_err(|source| PipelineError::ConfigParse {
                path: "<inline>".into(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.extent.validate()?;

        if self.image.width == 0 || self.image.height == 0 {
            return Err(ConfigError::variable(
                "image",
                format!(
                    "size {}x{} must be non-zero",
                    self.image.width, self.image.height
                ),
            ));
        }
        if self.steps.is_empty() || self.steps.last > MAX_FORECAST_STEP {
            return Err(ConfigError::variable(
                "steps",
                format!(
                    "range {}..={} must be ascending and end at or before {}",
                    self.steps.first, self.steps.last, MAX_FORECAST_STEP
                ),
            ));
        }
        if self.variables.is_empty() {
            return Err(ConfigError::variable("variables", "at least one is required"));
        }

        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        let mut dirs = HashSet::new();
        let mut prefixes = HashSet::new();
        for variable in &self.variables {
            variable.validate()?;
            if !names.insert(variable.name.as_str())
                || !keys.insert(variable.key.as_str())
                || !dirs.insert(variable.output_dir.as_str())
                || !prefixes.insert(variable.url_prefix.trim_end_matches('/'))
            {
                return Err(ConfigError::DuplicateVariable(variable.name.clone()));
            }
            if variable.key == "hour" {
                return Err(ConfigError::variable(
                    &variable.name,
                    "key 'hour' is reserved by the combined index",
                ));
            }
        }

        if self.index.layout == IndexLayout::Single && self.primary_variable().is_none() {
            return Err(ConfigError::variable(
                &self.index.primary,
                "primary index variable is not configured",
            ));
        }
        Ok(())
    }

    /// Variable listed by the single-variable index.
    pub fn primary_variable(&self) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.name == self.index.primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn cycle(y: i32, m: u32, d: u32, h: u32) -> ForecastCycle {
        ForecastCycle::from_parts(NaiveDate::from_ymd_opt(y, m, d).unwrap(), h).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.steps.len(), 49);
        assert_eq!(config.primary_variable().unwrap().key, "refc");
    }

    #[test]
    fn test_url_for_reflectivity() {
        let source = SourceConfig::default();
        let url = source.url_for(&cycle(2024, 5, 1, 18), 7, &VariableSpec::reflectivity());
        assert_eq!(
            url,
            "https://nomads.ncep.noaa.gov/cgi-bin/filter_hrrr_2d.pl\
             ?dir=%2Fhrrr.20240501%2Fconus&file=hrrr.t18z.wrfsfcf07.grib2\
             &var_REFC=on&lev_entire_atmosphere=on"
        );
    }

    #[test]
    fn test_url_for_with_subregion() {
        let source = SourceConfig {
            subregion: Some(Subregion {
                top_lat: 50.0,
                left_lon: -126.0,
                right_lon: -66.0,
                bottom_lat: 24.0,
            }),
            ..SourceConfig::default()
        };
        let url = source.url_for(
            &cycle(2024, 5, 1, 0),
            0,
            &VariableSpec::temperature_2m(),
        );
        assert!(url.contains("&var_TMP=on&lev_2_m_above_ground=on"));
        assert!(url.ends_with("&subregion=&toplat=50&leftlon=-126&rightlon=-66&bottomlat=24"));
    }

    #[test]
    fn test_retry_delays_double_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(64), Duration::from_secs(30));
    }

    #[test]
    fn test_cycle_config_uses_lag() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 13, 10, 0).unwrap();
        let latest = CycleConfig::default().latest(now);
        assert_eq!(latest.to_string(), "20240501/06z");

        let no_lag = CycleConfig {
            lag_hours: 0,
            interval_hours: 6,
        };
        assert_eq!(no_lag.latest(now).to_string(), "20240501/12z");
    }

    #[test]
    fn test_rejects_duplicate_variables() {
        let mut config = PipelineConfig::default();
        config.variables.push(VariableSpec::reflectivity());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateVariable(name)) if name == "reflectivity"
        ));
    }

    #[test]
    fn test_rejects_bad_steps_and_primary() {
        let mut config = PipelineConfig::default();
        config.steps = StepRange { first: 5, last: 49 };
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.index.primary = "snow".to_string();
        assert!(config.validate().is_err());

        // Combined layout does not need a primary variable
        config.index.layout = IndexLayout::Combined;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = PipelineConfig::from_yaml_str(
            r#"
steps:
  first: 0
  last: 6
index:
  layout: combined
  pairing: positional
"#,
        )
        .unwrap();
        assert_eq!(config.steps.len(), 7);
        assert_eq!(config.index.layout, IndexLayout::Combined);
        assert_eq!(config.index.pairing, Pairing::Positional);
        assert_eq!(config.variables.len(), 3);
        assert_eq!(config.image, ImageSize::default());
        assert_eq!(config.source.base_url, NOMADS_HRRR_FILTER);
    }
}
