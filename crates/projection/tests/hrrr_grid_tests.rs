//! HRRR grid placement checks against well-known locations.

use projection::{GridProjection, LambertConformal, LatLonGrid};
use test_utils::fixtures::{hrrr, places};

fn hrrr_grid() -> GridProjection {
    GridProjection::Lambert(LambertConformal::hrrr().unwrap())
}

#[test]
fn test_kansas_city_near_grid_center() {
    let (lat, lon) = places::KANSAS_CITY;
    let (i, j) = hrrr_grid().geo_to_grid(lat, lon);
    assert!(i > 700.0 && i < 1100.0, "KC should be in middle x, got {}", i);
    assert!(j > 400.0 && j < 700.0, "KC should be in middle y, got {}", j);
}

#[test]
fn test_cities_inside_grid() {
    let grid = hrrr_grid();
    for (lat, lon) in [places::DENVER, places::MIAMI, places::SEATTLE] {
        assert!(grid.contains(lat, lon), "({}, {}) should be inside HRRR", lat, lon);
    }
}

#[test]
fn test_overlay_southeast_corner_outside_grid() {
    // The CONUS overlay box reaches further east at low latitudes than HRRR does
    assert!(!hrrr_grid().contains(24.5, -66.5));
}

#[test]
fn test_geographic_bounds_cover_conus() {
    let proj = LambertConformal::hrrr().unwrap();
    let (min_lon, min_lat, max_lon, max_lat) = proj.geographic_bounds();

    assert!(min_lon < -130.0, "min_lon {}", min_lon);
    assert!(max_lon > -65.0, "max_lon {}", max_lon);
    assert!((min_lat - hrrr::FIRST_LAT).abs() < 1.0, "min_lat {}", min_lat);
    assert!(max_lat > 47.0, "max_lat {}", max_lat);
    assert_eq!(proj.dimensions(), (hrrr::NX as usize, hrrr::NY as usize));
}

#[test]
fn test_latlon_contains_respects_wrap() {
    let global = GridProjection::LatLon(LatLonGrid::new(90.0, 0.0, 1.0, 1.0, 360, 181).unwrap());
    assert!(global.wraps_columns());
    // Between the last column (359E) and the first (0E)
    assert!(global.contains(10.0, -0.5));

    let regional =
        GridProjection::LatLon(LatLonGrid::new(50.0, -130.0, 1.0, 1.0, 10, 10).unwrap());
    assert!(!regional.wraps_columns());
    assert!(regional.contains(45.0, -125.0));
    assert!(!regional.contains(45.0, -131.0));
    assert!(!regional.contains(39.0, -125.0));
}
