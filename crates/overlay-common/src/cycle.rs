//! Forecast cycle selection.
//!
//! HRRR runs every hour, but only the 00/06/12/18z cycles extend out to 48
//! forecast hours. The overlay pipeline therefore always targets the most
//! recent 6-hourly cycle, after backing off a fixed lag to give NOMADS time
//! to publish the files.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Default publication lag subtracted from "now" before picking a cycle.
pub const DEFAULT_LAG_HOURS: i64 = 6;

/// Hours between extended (48h) HRRR cycles.
pub const DEFAULT_CYCLE_INTERVAL_HOURS: u32 = 6;

/// A model run, identified by its reference (initialization) time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForecastCycle {
    pub reference_time: DateTime<Utc>,
}

impl ForecastCycle {
    /// Latest cycle considered complete at `now` using the default lag and interval.
    pub fn latest(now: DateTime<Utc>) -> Self {
        Self::latest_with(
            now,
            Duration::hours(DEFAULT_LAG_HOURS),
            DEFAULT_CYCLE_INTERVAL_HOURS,
        )
    }

    /// Latest cycle at `now - lag`, floored to a multiple of `interval_hours`.
    pub fn latest_with(now: DateTime<Utc>, lag: Duration, interval_hours: u32) -> Self {
        let shifted = now - lag;
        let interval = interval_hours.clamp(1, 24);
        let hour = shifted.hour() / interval * interval;

        let midnight = shifted.date_naive().and_time(NaiveTime::MIN);
        let naive = midnight + Duration::hours(hour as i64);

        Self {
            reference_time: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
        }
    }

    /// Build a cycle from a calendar date and cycle hour. Returns None for hour >= 24.
    pub fn from_parts(date: NaiveDate, hour: u32) -> Option<Self> {
        let naive = date.and_hms_opt(hour, 0, 0)?;
        Some(Self {
            reference_time: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
        })
    }

    /// Cycle date as `YYYYMMDD`.
    pub fn date_str(&self) -> String {
        self.reference_time.format("%Y%m%d").to_string()
    }

    pub fn cycle_hour(&self) -> u32 {
        self.reference_time.hour()
    }

    /// Cycle hour zero-padded to two digits (`00`, `06`, `12`, `18`).
    pub fn hour_str(&self) -> String {
        format!("{:02}", self.cycle_hour())
    }

    /// Valid time of forecast step `step` (hours after the reference time).
    pub fn valid_time(&self, step: u32) -> DateTime<Utc> {
        self.reference_time + Duration::hours(step as i64)
    }
}

impl fmt::Display for ForecastCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}z", self.date_str(), self.hour_str())
    }
}
