//! Lambert Conformal Conic projection.
//!
//! This projection is used for HRRR. It maps a cone tangent or secant to the
//! Earth's surface onto a flat plane.
//!
//! The projection parameters include:
//! - Central meridian (LoV in GRIB2)
//! - Standard parallel(s): Latin1 and Latin2 (equal for a tangent cone)
//! - Grid spacing: dx, dy in meters
//! - First grid point: lat1, lon1
//!
//! Projected coordinates are measured from the cone apex, so the first grid
//! point's projected position is the offset for grid indices.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::{normalize_longitude, ProjectionError, DEFAULT_EARTH_RADIUS};

/// GRIB2 template 3.30 parameters, angles in degrees, lengths in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertParams {
    pub lat1: f64,
    pub lon1: f64,
    pub lov: f64,
    pub latin1: f64,
    pub latin2: f64,
    pub dx: f64,
    pub dy: f64,
    pub nx: usize,
    pub ny: usize,
    pub earth_radius: f64,
}

/// A Lambert conformal grid: converts between geographic coordinates and
/// fractional (i, j) indices in file scan order.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian in radians
    lon0: f64,
    /// Cone constant
    n: f64,
    /// R * F
    rf: f64,
    x_first: f64,
    y_first: f64,
    dx: f64,
    dy: f64,
    nx: usize,
    ny: usize,
    /// -1 when i increases westward
    i_sign: f64,
    /// -1 when j increases southward
    j_sign: f64,
}

impl LambertConformal {
    /// Build from GRIB2 parameters. i runs east and j runs north unless
    /// [`with_scanning`](Self::with_scanning) says otherwise.
    pub fn from_grib2(params: LambertParams) -> Result<Self, ProjectionError> {
        let LambertParams {
            lat1,
            lon1,
            lov,
            latin1,
            latin2,
            dx,
            dy,
            nx,
            ny,
            earth_radius,
        } = params;

        if nx == 0 || ny == 0 {
            return Err(ProjectionError::InvalidParameter(format!(
                "empty grid {}x{}",
                nx, ny
            )));
        }
        if !(dx > 0.0 && dy > 0.0 && earth_radius > 0.0) {
            return Err(ProjectionError::InvalidParameter(format!(
                "non-positive spacing or radius: dx={} dy={} r={}",
                dx, dy, earth_radius
            )));
        }
        if latin1.abs() >= 90.0 || latin2.abs() >= 90.0 {
            return Err(ProjectionError::InvalidParameter(
                "standard parallels must lie strictly between the poles".to_string(),
            ));
        }

        let to_rad = PI / 180.0;
        let phi1 = latin1 * to_rad;
        let phi2 = latin2 * to_rad;

        let n = if (phi1 - phi2).abs() < 1e-10 {
            // Tangent cone
            phi1.sin()
        } else {
            // Secant cone
            (phi1.cos() / phi2.cos()).ln()
                / ((FRAC_PI_4 + phi2 / 2.0).tan() / (FRAC_PI_4 + phi1 / 2.0).tan()).ln()
        };
        if !n.is_finite() || n.abs() < 1e-10 {
            return Err(ProjectionError::InvalidParameter(format!(
                "degenerate cone constant for parallels {} / {}",
                latin1, latin2
            )));
        }

        let f = phi1.cos() * (FRAC_PI_4 + phi1 / 2.0).tan().powf(n) / n;

        let mut proj = Self {
            lon0: lov * to_rad,
            n,
            rf: earth_radius * f,
            x_first: 0.0,
            y_first: 0.0,
            dx,
            dy,
            nx,
            ny,
            i_sign: 1.0,
            j_sign: 1.0,
        };
        let (x_first, y_first) = proj.project(lat1, lon1);
        proj.x_first = x_first;
        proj.y_first = y_first;
        Ok(proj)
    }

    /// HRRR CONUS grid: 1799 x 1059 points at 3 km, tangent at 38.5N, LoV 97.5W,
    /// first point 21.138123N 122.719528W.
    pub fn hrrr() -> Result<Self, ProjectionError> {
        Self::from_grib2(LambertParams {
            lat1: 21.138123,
            lon1: -122.719528,
            lov: -97.5,
            latin1: 38.5,
            latin2: 38.5,
            dx: 3000.0,
            dy: 3000.0,
            nx: 1799,
            ny: 1059,
            earth_radius: DEFAULT_EARTH_RADIUS,
        })
    }

    /// Apply the GRIB2 scanning direction flags.
    pub fn with_scanning(mut self, i_negative: bool, j_positive: bool) -> Self {
        self.i_sign = if i_negative { -1.0 } else { 1.0 };
        self.j_sign = if j_positive { 1.0 } else { -1.0 };
        self
    }

    /// Projected (x, y) in meters, origin at the cone apex.
    fn project(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;
        let dlon = normalize_longitude(lon_deg - self.lon0 / to_rad) * to_rad;

        let rho = self.rf / (FRAC_PI_4 + lat / 2.0).tan().powf(self.n);
        let theta = self.n * dlon;
        (rho * theta.sin(), -rho * theta.cos())
    }

    /// Convert geographic coordinates (degrees) to fractional grid indices (i, j).
    ///
    /// Indices may be negative or beyond the grid for points outside it.
    pub fn geo_to_grid(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let (x, y) = self.project(lat_deg, lon_deg);
        let i = self.i_sign * (x - self.x_first) / self.dx;
        let j = self.j_sign * (y - self.y_first) / self.dy;
        (i, j)
    }

    /// Convert grid indices (i, j) to geographic coordinates. Returns (lat, lon) in degrees.
    pub fn grid_to_geo(&self, i: f64, j: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        let x = self.x_first + self.i_sign * i * self.dx;
        let y = self.y_first + self.j_sign * j * self.dy;

        let sign = self.n.signum();
        let rho = sign * (x * x + y * y).sqrt();
        let theta = (sign * x).atan2(-sign * y);

        let lat = 2.0 * (self.rf / rho).powf(1.0 / self.n).atan() - FRAC_PI_2;
        let lon = self.lon0 + theta / self.n;

        (lat * to_deg, normalize_longitude(lon * to_deg))
    }

    /// Approximate geographic bounding box of the grid, sampled along its edges.
    ///
    /// Returns (min_lon, min_lat, max_lon, max_lat) in degrees.
    pub fn geographic_bounds(&self) -> (f64, f64, f64, f64) {
        let (max_i, max_j) = (self.nx as f64 - 1.0, self.ny as f64 - 1.0);
        let mut bounds = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);

        for t in 0..=20 {
            let frac = t as f64 / 20.0;
            for (i, j) in [
                (frac * max_i, 0.0),
                (frac * max_i, max_j),
                (0.0, frac * max_j),
                (max_i, frac * max_j),
            ] {
                let (lat, lon) = self.grid_to_geo(i, j);
                bounds.0 = bounds.0.min(lon);
                bounds.1 = bounds.1.min(lat);
                bounds.2 = bounds.2.max(lon);
                bounds.3 = bounds.3.max(lat);
            }
        }
        bounds
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }
}
