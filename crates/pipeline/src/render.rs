//! Render stage: GRIB2 payload on disk to PNG overlay on disk.
//!
//! Decoding and rasterizing are CPU-bound, so the whole stage runs on the
//! blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use grib2_parser::{DecodedField, Grib2Error, GridTemplate};
use overlay_common::VariableSpec;
use projection::{GridProjection, LambertConformal, LambertParams, LatLonGrid, ProjectionError};
use renderer::{OverlayRenderer, RenderError};
use thiserror::Error;
use tracing::debug;

/// Render stage failures. `Io` aborts the run; everything else skips the step.
#[derive(Error, Debug)]
pub enum RenderStageError {
    #[error("Decode failed: {0}")]
    Decode(#[from] Grib2Error),

    #[error("Unsupported grid: {0}")]
    Grid(#[from] ProjectionError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Render task did not complete: {0}")]
    Task(String),
}

/// Summary of one rendered overlay.
#[derive(Debug, Clone)]
pub struct RenderedStep {
    pub png_path: PathBuf,
    pub bytes: usize,
    pub coverage: f64,
    pub value_range: Option<(f32, f32)>,
}

/// Projection matching a decoded grid definition, honoring its scan directions.
pub fn projection_for(grid: &GridTemplate) -> Result<GridProjection, ProjectionError> {
    match grid {
        GridTemplate::LambertConformal(g) => {
            if g.projection_centre & 0x80 != 0 {
                return Err(ProjectionError::InvalidParameter(
                    "south pole Lambert projections are not supported".to_string(),
                ));
            }
            let proj = LambertConformal::from_grib2(LambertParams {
                lat1: g.la1,
                lon1: g.lo1,
                lov: g.lov,
                latin1: g.latin1,
                latin2: g.latin2,
                dx: g.dx,
                dy: g.dy,
                nx: g.nx as usize,
                ny: g.ny as usize,
                earth_radius: g.earth_radius,
            })?;
            let scan = g.scanning_mode;
            Ok(GridProjection::Lambert(
                proj.with_scanning(scan.i_negative(), scan.j_positive()),
            ))
        }
        GridTemplate::LatLon(g) => {
            let grid = LatLonGrid::new(g.la1, g.lo1, g.di, g.dj, g.ni as usize, g.nj as usize)?;
            let scan = g.scanning_mode;
            Ok(GridProjection::LatLon(
                grid.with_scanning(scan.i_negative(), scan.j_positive()),
            ))
        }
        GridTemplate::Other { template, .. } => Err(ProjectionError::InvalidParameter(format!(
            "grid definition template 3.{}",
            template
        ))),
    }
}

/// Decode `payload` and render it for `variable`, writing the PNG to `png_path`.
///
/// Blocking; call through [`render_payload`] from async code.
pub fn render_file(
    renderer: &OverlayRenderer,
    payload: &Path,
    variable: &VariableSpec,
    png_path: &Path,
) -> Result<RenderedStep, RenderStageError> {
    let bytes = std::fs::read(payload).map_err(|source| RenderStageError::Io {
        path: payload.to_path_buf(),
        source,
    })?;

    let field: DecodedField = grib2_parser::decode_field(&bytes, &variable.selector)?;
    let projection = projection_for(&field.grid)?;
    let overlay = renderer.render_variable(&field.values, &projection, variable)?;

    std::fs::write(png_path, &overlay.png).map_err(|source| RenderStageError::Io {
        path: png_path.to_path_buf(),
        source,
    })?;

    debug!(
        variable = %variable.name,
        field = %field.short_name(),
        valid = field.valid_count(),
        coverage = overlay.coverage(),
        "Rendered field"
    );

    Ok(RenderedStep {
        png_path: png_path.to_path_buf(),
        bytes: overlay.png.len(),
        coverage: overlay.coverage(),
        value_range: field.value_range(),
    })
}

/// Run [`render_file`] on the blocking pool.
pub async fn render_payload(
    renderer: Arc<OverlayRenderer>,
    payload: PathBuf,
    variable: VariableSpec,
    png_path: PathBuf,
) -> Result<RenderedStep, RenderStageError> {
    tokio::task::spawn_blocking(move || render_file(&renderer, &payload, &variable, &png_path))
        .await
        .map_err(|e| RenderStageError::Task(e.to_string()))?
}
