//! Resampling a decoded field onto the fixed output extent.
//!
//! Every output pixel center is located in the source grid through the
//! field's projection and sampled bilinearly from its four neighbours.

use overlay_common::{GeoExtent, UnitTransform};
use projection::GridProjection;
use rayon::prelude::*;

use crate::palette::{Palette, Rgba};
use crate::RenderError;

/// RGBA pixels for one overlay, row 0 at the northern edge.
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
    /// Pixels that received a non-transparent color
    pub painted: usize,
}

impl Raster {
    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        let at = (y * self.width + x) * 4;
        Rgba::new(
            self.pixels[at],
            self.pixels[at + 1],
            self.pixels[at + 2],
            self.pixels[at + 3],
        )
    }
}

/// A field's values together with the grid they were sampled on.
#[derive(Debug, Clone, Copy)]
pub struct SourceGrid<'a> {
    /// Values in file scan order, i varying fastest
    pub values: &'a [f32],
    pub projection: &'a GridProjection,
}

impl<'a> SourceGrid<'a> {
    pub fn new(values: &'a [f32], projection: &'a GridProjection) -> Result<Self, RenderError> {
        let (nx, ny) = projection.dimensions();
        if values.len() != nx * ny {
            return Err(RenderError::GridMismatch {
                expected: nx * ny,
                actual: values.len(),
            });
        }
        Ok(Self { values, projection })
    }

    /// Bilinear sample at fractional grid position (i, j).
    ///
    /// None outside the grid or when any of the four neighbours is missing.
    pub fn sample(&self, i: f64, j: f64) -> Option<f32> {
        let (nx, ny) = self.projection.dimensions();
        let wraps = self.projection.wraps_columns();
        if !i.is_finite() || !j.is_finite() {
            return None;
        }

        let max_i = if wraps { nx as f64 } else { nx as f64 - 1.0 };
        if i < 0.0 || i > max_i || j < 0.0 || j > ny as f64 - 1.0 {
            return None;
        }

        let i0 = i.floor() as usize;
        let j0 = j.floor() as usize;
        let fi = (i - i0 as f64) as f32;
        let fj = (j - j0 as f64) as f32;

        let (i0, i1) = if wraps {
            (i0 % nx, (i0 + 1) % nx)
        } else {
            (i0.min(nx - 1), (i0 + 1).min(nx - 1))
        };
        let j1 = (j0 + 1).min(ny - 1);

        let at = |col: usize, row: usize| self.values[row * nx + col];
        let (v00, v10, v01, v11) = (at(i0, j0), at(i1, j0), at(i0, j1), at(i1, j1));
        if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
            return None;
        }

        let top = v00 + (v10 - v00) * fi;
        let bottom = v01 + (v11 - v01) * fi;
        Some(top + (bottom - top) * fj)
    }
}

/// Paint `source` onto a `width` x `height` image covering `extent`.
///
/// Rows are rendered in parallel.
pub fn rasterize(
    source: &SourceGrid<'_>,
    extent: &GeoExtent,
    width: usize,
    height: usize,
    transform: UnitTransform,
    palette: &Palette,
) -> Result<Raster, RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidDimensions { width, height });
    }

    let mut pixels = vec![0u8; width * height * 4];
    let painted = pixels
        .par_chunks_mut(width * 4)
        .enumerate()
        .map(|(py, row)| {
            let mut painted = 0;
            for (px, out) in row.chunks_exact_mut(4).enumerate() {
                let (lat, lon) = extent.pixel_center(px, py, width, height);
                let (i, j) = source.projection.geo_to_grid(lat, lon);
                let color = match source.sample(i, j) {
                    Some(value) => palette.color_for(transform.apply(value)),
                    None => Rgba::TRANSPARENT,
                };
                if color.a > 0 {
                    painted += 1;
                }
                out.copy_from_slice(&[color.r, color.g, color.b, color.a]);
            }
            painted
        })
        .sum();

    Ok(Raster {
        width,
        height,
        pixels,
        painted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::LatLonGrid;

    fn two_by_two() -> GridProjection {
        GridProjection::LatLon(LatLonGrid::new(41.0, -101.0, 1.0, 1.0, 2, 2).unwrap())
    }

    #[test]
    fn test_sample_corners_and_center() {
        let proj = two_by_two();
        let values = [0.0, 10.0, 20.0, 30.0];
        let grid = SourceGrid::new(&values, &proj).unwrap();

        assert_eq!(grid.sample(0.0, 0.0), Some(0.0));
        assert_eq!(grid.sample(1.0, 1.0), Some(30.0));
        assert_eq!(grid.sample(0.5, 0.5), Some(15.0));
        assert_eq!(grid.sample(1.0, 0.0), Some(10.0));
    }

    #[test]
    fn test_sample_outside_is_none() {
        let proj = two_by_two();
        let values = [1.0; 4];
        let grid = SourceGrid::new(&values, &proj).unwrap();

        assert_eq!(grid.sample(-0.01, 0.5), None);
        assert_eq!(grid.sample(0.5, 1.01), None);
        assert_eq!(grid.sample(f64::NAN, 0.0), None);
    }

    #[test]
    fn test_missing_neighbour_is_none() {
        let proj = two_by_two();
        let values = [1.0, 1.0, 1.0, f32::NAN];
        let grid = SourceGrid::new(&values, &proj).unwrap();

        assert_eq!(grid.sample(0.5, 0.5), None);
        // The top edge never reaches the missing corner
        assert_eq!(grid.sample(0.5, 0.0), Some(1.0));
    }

    #[test]
    fn test_wrapping_columns_blend_last_and_first() {
        let proj = GridProjection::LatLon(LatLonGrid::new(90.0, 0.0, 90.0, 90.0, 4, 3).unwrap());
        let mut values = vec![0.0; 12];
        values[3] = 100.0;
        let grid = SourceGrid::new(&values, &proj).unwrap();

        assert_eq!(grid.sample(3.5, 0.0), Some(50.0));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let proj = two_by_two();
        let values = [1.0; 3];
        assert!(matches!(
            SourceGrid::new(&values, &proj),
            Err(RenderError::GridMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }
}
