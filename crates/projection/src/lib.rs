//! Coordinate transforms from geographic positions to source-grid indices.
//!
//! Implements the projections HRRR overlays need from scratch: Lambert
//! conformal conic for native HRRR grids and plain lat/lon for regular grids.

pub mod lambert;
pub mod latlon;

use thiserror::Error;

pub use lambert::{LambertConformal, LambertParams};
pub use latlon::LatLonGrid;

/// Radius of the spherical earth HRRR is defined on (shape of earth code 6).
pub const DEFAULT_EARTH_RADIUS: f64 = 6_371_229.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Invalid projection parameter: {0}")]
    InvalidParameter(String),
}

/// Wrap a longitude into [-180, 180).
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// A source grid that geographic points can be located in.
#[derive(Debug, Clone)]
pub enum GridProjection {
    Lambert(LambertConformal),
    LatLon(LatLonGrid),
}

impl GridProjection {
    /// Fractional (i, j) of a point, where (0, 0) is the first value in the file
    /// and i varies fastest.
    pub fn geo_to_grid(&self, lat: f64, lon: f64) -> (f64, f64) {
        match self {
            GridProjection::Lambert(p) => p.geo_to_grid(lat, lon),
            GridProjection::LatLon(p) => p.geo_to_grid(lat, lon),
        }
    }

    /// (columns, rows)
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            GridProjection::Lambert(p) => p.dimensions(),
            GridProjection::LatLon(p) => p.dimensions(),
        }
    }

    /// True when column indices wrap around (global lat/lon grids).
    pub fn wraps_columns(&self) -> bool {
        match self {
            GridProjection::Lambert(_) => false,
            GridProjection::LatLon(p) => p.wraps_globally(),
        }
    }

    /// Whether the point falls within the grid's sampled area.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let (i, j) = self.geo_to_grid(lat, lon);
        let (nx, ny) = self.dimensions();
        let max_i = if self.wraps_columns() {
            nx as f64
        } else {
            nx as f64 - 1.0
        };
        i >= 0.0 && i <= max_i && j >= 0.0 && j <= ny as f64 - 1.0
    }
}
