//! Regular latitude/longitude grids (GRIB2 template 3.0).

use crate::ProjectionError;

#[derive(Debug, Clone)]
pub struct LatLonGrid {
    lat1: f64,
    lon1: f64,
    di: f64,
    dj: f64,
    ni: usize,
    nj: usize,
    i_negative: bool,
    j_positive: bool,
}

impl LatLonGrid {
    /// Grid whose first point is (`lat1`, `lon1`) with increments `di`/`dj` in degrees.
    /// By default i runs east and j runs south, the usual GRIB2 scan order.
    pub fn new(
        lat1: f64,
        lon1: f64,
        di: f64,
        dj: f64,
        ni: usize,
        nj: usize,
    ) -> Result<Self, ProjectionError> {
        if ni == 0 || nj == 0 {
            return Err(ProjectionError::InvalidParameter(format!(
                "empty grid {}x{}",
                ni, nj
            )));
        }
        if !(di > 0.0 && dj > 0.0) {
            return Err(ProjectionError::InvalidParameter(format!(
                "non-positive increments di={} dj={}",
                di, dj
            )));
        }
        Ok(Self {
            lat1,
            lon1,
            di,
            dj,
            ni,
            nj,
            i_negative: false,
            j_positive: false,
        })
    }

    /// Apply the GRIB2 scanning direction flags.
    pub fn with_scanning(mut self, i_negative: bool, j_positive: bool) -> Self {
        self.i_negative = i_negative;
        self.j_positive = j_positive;
        self
    }

    /// True when the columns cover the full circle, so the last column neighbors the first.
    pub fn wraps_globally(&self) -> bool {
        (self.ni as f64 * self.di - 360.0).abs() < self.di * 0.5
    }

    /// Fractional (i, j) indices of a geographic point, in file scan order.
    pub fn geo_to_grid(&self, lat: f64, lon: f64) -> (f64, f64) {
        let dlon = if self.i_negative {
            (self.lon1 - lon).rem_euclid(360.0)
        } else {
            (lon - self.lon1).rem_euclid(360.0)
        };
        let dlat = if self.j_positive {
            lat - self.lat1
        } else {
            self.lat1 - lat
        };
        (dlon / self.di, dlat / self.dj)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.ni, self.nj)
    }
}
