//! Rendering of decoded weather fields into transparent PNG overlays.
//!
//! A field is resampled onto a fixed geographic extent, colored through a
//! variable's palette and encoded as a PNG with no axes or padding. Rows are
//! spaced per the extent's `row_spacing`; the default (Web Mercator) lines up
//! with an image overlay stretched over the same bounds on a Leaflet map.

pub mod palette;
pub mod png;
pub mod raster;

use overlay_common::{ConfigError, GeoExtent, UnitTransform, VariableSpec};
use projection::GridProjection;
use thiserror::Error;
use tracing::debug;

pub use palette::{Palette, Rgba};
pub use png::PngError;
pub use raster::{rasterize, Raster, SourceGrid};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Grid holds {actual} values, projection expects {expected}")]
    GridMismatch { expected: usize, actual: usize },

    #[error("Invalid output size {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] PngError),
}

/// An encoded overlay image.
#[derive(Debug, Clone)]
pub struct RenderedOverlay {
    pub png: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// Pixels that received a non-transparent color
    pub painted: usize,
}

impl RenderedOverlay {
    /// Fraction of the image covered by data, in [0, 1].
    pub fn coverage(&self) -> f64 {
        self.painted as f64 / (self.width * self.height) as f64
    }
}

/// Renders fields onto one fixed extent at one fixed image size.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    extent: GeoExtent,
    width: usize,
    height: usize,
}

impl OverlayRenderer {
    pub fn new(extent: GeoExtent, width: usize, height: usize) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        extent.validate()?;
        Ok(Self {
            extent,
            width,
            height,
        })
    }

    /// Render `values` (file scan order on `projection`) with an explicit
    /// transform and palette.
    pub fn render(
        &self,
        values: &[f32],
        projection: &GridProjection,
        transform: UnitTransform,
        palette: &Palette,
    ) -> Result<RenderedOverlay, RenderError> {
        let source = SourceGrid::new(values, projection)?;
        let raster = rasterize(
            &source,
            &self.extent,
            self.width,
            self.height,
            transform,
            palette,
        )?;
        let png = png::encode_auto(&raster.pixels, raster.width, raster.height)?;

        debug!(
            width = raster.width,
            height = raster.height,
            painted = raster.painted,
            bytes = png.len(),
            "Rendered overlay"
        );

        Ok(RenderedOverlay {
            png,
            width: raster.width,
            height: raster.height,
            painted: raster.painted,
        })
    }

    /// Render `values` using the transform and palette configured for `variable`.
    pub fn render_variable(
        &self,
        values: &[f32],
        projection: &GridProjection,
        variable: &VariableSpec,
    ) -> Result<RenderedOverlay, RenderError> {
        let palette = Palette::from_spec(&variable.palette)?;
        self.render(values, projection, variable.transform, &palette)
    }
}
