//! Geographic extent of the rendered overlays.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Latitude limit of the Web Mercator projection (EPSG:3857).
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// How output image rows are spaced between `north` and `south`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSpacing {
    /// Evenly in Web Mercator y, as a Leaflet/OpenLayers image overlay is drawn
    #[default]
    Mercator,
    /// Evenly in latitude (plate carree)
    Latitude,
}

/// A rectangular geographic extent in degrees.
///
/// Overlays are rendered so that the PNG's left/right edges sit on `west`/`east`
/// and its top/bottom edges on `north`/`south`. The front end places the image
/// with the same four numbers, so both sides must agree. Rows follow
/// `row_spacing`, which must match the map the image is stretched over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoExtent {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
    #[serde(default)]
    pub row_spacing: RowSpacing,
}

/// Web Mercator y (unit sphere) of a latitude in degrees.
fn mercator_y(lat: f64) -> f64 {
    (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln()
}

fn mercator_lat(y: f64) -> f64 {
    (2.0 * y.exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees()
}

impl GeoExtent {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Self {
        Self {
            west,
            east,
            south,
            north,
            row_spacing: RowSpacing::default(),
        }
    }

    pub fn with_row_spacing(mut self, row_spacing: RowSpacing) -> Self {
        self.row_spacing = row_spacing;
        self
    }

    /// Continental US bounds matching the map page's default view.
    pub fn conus() -> Self {
        Self::new(-125.0, -66.5, 24.5, 49.5)
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Geographic position of the center of pixel (`px`, `py`) in an image of
    /// `width` x `height` pixels covering this extent. Row 0 is the northern edge.
    ///
    /// Returns (lat, lon).
    pub fn pixel_center(&self, px: usize, py: usize, width: usize, height: usize) -> (f64, f64) {
        let lon = self.west + (px as f64 + 0.5) / width as f64 * self.width();
        let fy = (py as f64 + 0.5) / height as f64;
        let lat = match self.row_spacing {
            RowSpacing::Latitude => self.north - fy * self.height(),
            RowSpacing::Mercator => {
                let top = mercator_y(self.north);
                let bottom = mercator_y(self.south);
                mercator_lat(top - fy * (top - bottom))
            }
        };
        (lat, lon)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let values = [self.west, self.east, self.south, self.north];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidExtent(format!("{:?}", self)));
        }
        if self.west >= self.east {
            return Err(ConfigError::InvalidExtent(format!(
                "west ({}) must be less than east ({})",
                self.west, self.east
            )));
        }
        if self.south >= self.north {
            return Err(ConfigError::InvalidExtent(format!(
                "south ({}) must be less than north ({})",
                self.south, self.north
            )));
        }
        if self.south < -90.0 || self.north > 90.0 {
            return Err(ConfigError::InvalidExtent(
                "latitudes must lie within [-90, 90]".to_string(),
            ));
        }
        if self.row_spacing == RowSpacing::Mercator
            && (self.south < -MERCATOR_MAX_LAT || self.north > MERCATOR_MAX_LAT)
        {
            return Err(ConfigError::InvalidExtent(format!(
                "Mercator rows need latitudes within +/-{:.4}",
                MERCATOR_MAX_LAT
            )));
        }
        Ok(())
    }
}

impl Default for GeoExtent {
    fn default() -> Self {
        Self::conus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conus_dimensions() {
        let extent = GeoExtent::conus();
        assert_eq!(extent.width(), 58.5);
        assert_eq!(extent.height(), 25.0);
        assert!(extent.validate().is_ok());
    }

    #[test]
    fn test_pixel_center_corners() {
        let extent = GeoExtent::new(0.0, 10.0, 0.0, 10.0).with_row_spacing(RowSpacing::Latitude);

        let (lat, lon) = extent.pixel_center(0, 0, 10, 10);
        assert!((lat - 9.5).abs() < 1e-9);
        assert!((lon - 0.5).abs() < 1e-9);

        let (lat, lon) = extent.pixel_center(9, 9, 10, 10);
        assert!((lat - 0.5).abs() < 1e-9);
        assert!((lon - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_mercator_rows_match_map_overlay() {
        let extent = GeoExtent::conus();
        assert_eq!(extent.row_spacing, RowSpacing::Mercator);

        // A 1050-row image stretched over CONUS on a Web Mercator map puts the
        // middle row's center at ~38.04N, not at the 36.99N latitude midpoint
        let (lat, lon) = extent.pixel_center(0, 525, 1500, 1050);
        assert!((lat - 38.044).abs() < 0.01, "row 525 at {}", lat);
        assert!((lon - -124.9805).abs() < 1e-3);

        let flat = extent.with_row_spacing(RowSpacing::Latitude);
        let (lat, _) = flat.pixel_center(0, 525, 1500, 1050);
        assert!((lat - 36.988).abs() < 0.01, "row 525 at {}", lat);
    }

    #[test]
    fn test_mercator_rows_span_extent() {
        let extent = GeoExtent::conus();
        let (top, _) = extent.pixel_center(0, 0, 10, 1000);
        let (bottom, _) = extent.pixel_center(0, 999, 10, 1000);
        assert!(top < 49.5 && 49.5 - top < 0.02);
        assert!(bottom > 24.5 && bottom - 24.5 < 0.03);

        // Rows are further apart in latitude near the southern edge
        let (a, _) = extent.pixel_center(0, 0, 10, 10);
        let (b, _) = extent.pixel_center(0, 1, 10, 10);
        let (y, _) = extent.pixel_center(0, 8, 10, 10);
        let (z, _) = extent.pixel_center(0, 9, 10, 10);
        assert!(a - b < y - z);
    }

    #[test]
    fn test_row_spacing_defaults_when_absent() {
        let extent: GeoExtent =
            serde_yaml::from_str("{west: -125.0, east: -66.5, south: 24.5, north: 49.5}").unwrap();
        assert_eq!(extent, GeoExtent::conus());

        let flat: GeoExtent = serde_yaml::from_str(
            "{west: 0.0, east: 1.0, south: 0.0, north: 1.0, row_spacing: latitude}",
        )
        .unwrap();
        assert_eq!(flat.row_spacing, RowSpacing::Latitude);
    }

    #[test]
    fn test_validate_rejects_inverted() {
        assert!(GeoExtent::new(10.0, 0.0, 0.0, 10.0).validate().is_err());
        assert!(GeoExtent::new(0.0, 10.0, 10.0, 0.0).validate().is_err());
        assert!(GeoExtent::new(0.0, 10.0, -95.0, 10.0).validate().is_err());
        assert!(GeoExtent::new(f64::NAN, 10.0, 0.0, 10.0).validate().is_err());
        assert!(GeoExtent::new(0.0, 10.0, 0.0, 89.0).validate().is_err());
        assert!(GeoExtent::new(0.0, 10.0, 0.0, 89.0)
            .with_row_spacing(RowSpacing::Latitude)
            .validate()
            .is_ok());
    }
}
