//! Rendering decoded fields onto the CONUS overlay extent.

use overlay_common::{ColorStop, GeoExtent, PaletteSpec, RowSpacing, UnitTransform, VariableSpec};
use projection::{GridProjection, LambertConformal, LatLonGrid};
use renderer::{rasterize, OverlayRenderer, Palette, RenderError, Rgba, SourceGrid};
use test_utils::{create_constant_grid, create_grid_with_nans, create_reflectivity_grid};

const WIDTH: usize = 120;
const HEIGHT: usize = 84;

/// Half-degree lat/lon grid spanning well beyond the CONUS extent.
fn wide_latlon() -> GridProjection {
    GridProjection::LatLon(LatLonGrid::new(55.0, -130.0, 0.5, 0.5, 141, 71).unwrap())
}

fn raster_for(
    values: &[f32],
    projection: &GridProjection,
    variable: &VariableSpec,
) -> renderer::Raster {
    let palette = Palette::from_spec(&variable.palette).unwrap();
    let source = SourceGrid::new(values, projection).unwrap();
    rasterize(
        &source,
        &GeoExtent::conus(),
        WIDTH,
        HEIGHT,
        variable.transform,
        &palette,
    )
    .unwrap()
}

#[test]
fn test_grid_covering_extent_paints_every_pixel() {
    let proj = wide_latlon();
    let values = create_constant_grid(141, 71, 330.0);
    let raster = raster_for(&values, &proj, &VariableSpec::temperature_2m());

    assert_eq!(raster.painted, WIDTH * HEIGHT);
    assert_eq!(raster.pixel(0, 0), Rgba::new(255, 0, 0, 255));
    assert_eq!(raster.pixel(WIDTH - 1, HEIGHT - 1), Rgba::new(255, 0, 0, 255));
}

#[test]
fn test_grid_covering_west_half_leaves_east_transparent() {
    // Columns reach -95.5E, the extent runs to -66.5E
    let proj = GridProjection::LatLon(LatLonGrid::new(55.0, -130.0, 0.5, 0.5, 70, 71).unwrap());
    let values = create_constant_grid(70, 71, 290.0);
    let raster = raster_for(&values, &proj, &VariableSpec::temperature_2m());

    assert!(raster.pixel(0, HEIGHT / 2).a > 0);
    assert_eq!(raster.pixel(WIDTH - 1, HEIGHT / 2), Rgba::TRANSPARENT);
    assert!(raster.painted > 0 && raster.painted < WIDTH * HEIGHT);
}

#[test]
fn test_missing_values_render_transparent() {
    let proj = wide_latlon();
    let base = create_constant_grid(141, 71, 290.0);
    // Row 20 is 45N; blank the whole row
    let row: Vec<usize> = (20 * 141..21 * 141).collect();
    let values = create_grid_with_nans(&base, &row);
    let raster = raster_for(&values, &proj, &VariableSpec::temperature_2m());

    // With Mercator row spacing pixel row 17 sits on 45N
    let extent = GeoExtent::conus();
    let (lat, _) = extent.pixel_center(0, 17, WIDTH, HEIGHT);
    assert!((lat - 45.0).abs() < 0.5, "row 17 is at {}", lat);
    assert_eq!(raster.pixel(WIDTH / 2, 17), Rgba::TRANSPARENT);
    assert!(raster.pixel(WIDTH / 2, HEIGHT - 1).a > 0);
}

#[test]
fn test_clear_air_reflectivity_is_fully_transparent() {
    let proj = wide_latlon();
    let values = create_constant_grid(141, 71, -10.0);
    let raster = raster_for(&values, &proj, &VariableSpec::reflectivity());

    assert_eq!(raster.painted, 0);
    assert!(raster.pixels.iter().all(|&b| b == 0));
}

#[test]
fn test_storm_cell_paints_part_of_image() {
    let proj = wide_latlon();
    let values = create_reflectivity_grid(141, 71);
    let raster = raster_for(&values, &proj, &VariableSpec::reflectivity());

    assert!(raster.painted > 0);
    assert!(raster.painted < WIDTH * HEIGHT / 2);
}

#[test]
fn test_hrrr_grid_leaves_southeast_corner_transparent() {
    let proj = GridProjection::Lambert(LambertConformal::hrrr().unwrap());
    let (nx, ny) = proj.dimensions();
    let values = create_constant_grid(nx, ny, 42.0);
    let raster = raster_for(&values, &proj, &VariableSpec::reflectivity());

    // Kansas City sits near the middle of the image and of the HRRR domain
    assert_eq!(raster.pixel(WIDTH / 2, HEIGHT / 2).a, 255);
    assert_eq!(raster.pixel(WIDTH - 1, HEIGHT - 1), Rgba::TRANSPARENT);
}

#[test]
fn test_rows_follow_extent_row_spacing() {
    // Each source row holds its own latitude, so a pixel's color encodes where
    // it was sampled
    let proj = wide_latlon();
    let values: Vec<f32> = (0..71)
        .flat_map(|j| std::iter::repeat(55.0 - 0.5 * j as f32).take(141))
        .collect();
    let palette = Palette::from_spec(&PaletteSpec {
        stops: vec![
            ColorStop::new(20.0, "#000000"),
            ColorStop::new(55.0, "#ff0000"),
        ],
        transparent_below: None,
    })
    .unwrap();
    let source = SourceGrid::new(&values, &proj).unwrap();
    let red_at_middle = |extent: GeoExtent| {
        rasterize(&source, &extent, WIDTH, HEIGHT, UnitTransform::Identity, &palette)
            .unwrap()
            .pixel(0, HEIGHT / 2)
            .r
    };

    // Middle row: ~37.9N on a Mercator map, ~36.85N when evenly spaced
    let mercator = red_at_middle(GeoExtent::conus());
    let flat = red_at_middle(GeoExtent::conus().with_row_spacing(RowSpacing::Latitude));
    assert!(mercator > flat, "mercator {} flat {}", mercator, flat);
}

#[test]
fn test_renderer_produces_png() {
    let renderer = OverlayRenderer::new(GeoExtent::conus(), WIDTH, HEIGHT).unwrap();
    let proj = wide_latlon();
    let values = create_constant_grid(141, 71, 101_300.0);

    let overlay = renderer
        .render_variable(&values, &proj, &VariableSpec::mean_sea_level_pressure())
        .unwrap();
    assert_eq!(&overlay.png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    assert_eq!((overlay.width, overlay.height), (WIDTH, HEIGHT));
    assert!((overlay.coverage() - 1.0).abs() < 1e-12);
}

#[test]
fn test_renderer_rejects_bad_inputs() {
    assert!(matches!(
        OverlayRenderer::new(GeoExtent::conus(), 0, 10),
        Err(RenderError::InvalidDimensions { .. })
    ));
    assert!(OverlayRenderer::new(GeoExtent::new(10.0, -10.0, 0.0, 5.0), 10, 10).is_err());

    let renderer = OverlayRenderer::new(GeoExtent::conus(), 10, 10).unwrap();
    let palette = Palette::from_spec(&VariableSpec::reflectivity().palette).unwrap();
    let result = renderer.render(&[1.0; 5], &wide_latlon(), UnitTransform::Identity, &palette);
    assert!(matches!(result, Err(RenderError::GridMismatch { .. })));
}
