//! Test data generators for creating synthetic weather-like fields.
//!
//! All grids are row-major, row 0 first.

/// Creates a test grid where each cell is `col * 1000 + row`.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Temperature-like values in Kelvin, 250K in the first cell rising to ~310K.
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            data.push(250.0 + x_factor * 30.0 + y_factor * 30.0);
        }
    }
    data
}

/// Sea-level pressure in Pa: a low of ~980 hPa in the middle rising to ~1030 hPa at the edges.
pub fn create_pressure_grid(width: usize, height: usize) -> Vec<f32> {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let dist = (dx * dx + dy * dy).sqrt() / max_dist;
            data.push(98_000.0 + dist * 5_000.0);
        }
    }
    data
}

/// Composite reflectivity in dBZ: a storm cell peaking at 60 dBZ, clear air (-10 dBZ) elsewhere.
pub fn create_reflectivity_grid(width: usize, height: usize) -> Vec<f32> {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = (width.min(height) as f32 / 4.0).max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let dist = (dx * dx + dy * dy).sqrt() / radius;
            let dbz = if dist < 1.0 { 60.0 * (1.0 - dist) } else { -10.0 };
            data.push(dbz);
        }
    }
    data
}

pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Copy of `base` with NaN written at the given indices.
pub fn create_grid_with_nans(base: &[f32], nan_indices: &[usize]) -> Vec<f32> {
    let mut data = base.to_vec();
    for &i in nan_indices {
        if let Some(v) = data.get_mut(i) {
            *v = f32::NAN;
        }
    }
    data
}
