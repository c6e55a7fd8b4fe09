//! Palette behaviour for the configured overlay variables.

use overlay_common::{ColorStop, PaletteSpec, UnitTransform, VariableSpec};
use renderer::{Palette, Rgba};

fn reflectivity_palette() -> Palette {
    Palette::from_spec(&VariableSpec::reflectivity().palette).unwrap()
}

#[test]
fn test_exact_stop_values_take_stop_color() {
    let palette = reflectivity_palette();
    assert_eq!(palette.color_for(5.0), Rgba::new(0x04, 0xe9, 0xe7, 255));
    assert_eq!(palette.color_for(50.0), Rgba::new(0xfd, 0x00, 0x00, 255));
    assert_eq!(palette.color_for(70.0), Rgba::new(0x98, 0x54, 0xc6, 255));
}

#[test]
fn test_interpolates_between_stops() {
    let spec = PaletteSpec {
        stops: vec![ColorStop::new(0.0, "#000000"), ColorStop::new(10.0, "#c86432")],
        transparent_below: None,
    };
    let palette = Palette::from_spec(&spec).unwrap();

    assert_eq!(palette.color_for(5.0), Rgba::new(100, 50, 25, 255));
    assert_eq!(palette.color_for(2.5), Rgba::new(50, 25, 13, 255));
}

#[test]
fn test_clamps_outside_stop_range() {
    let palette = Palette::from_spec(&VariableSpec::temperature_2m().palette).unwrap();
    assert_eq!(palette.color_for(-80.0), Rgba::new(0x00, 0x00, 0x8b, 255));
    assert_eq!(palette.color_for(55.0), Rgba::new(0xff, 0x00, 0x00, 255));
}

#[test]
fn test_below_threshold_and_nan_are_transparent() {
    let palette = reflectivity_palette();
    assert_eq!(palette.color_for(4.99), Rgba::TRANSPARENT);
    assert_eq!(palette.color_for(-10.0), Rgba::TRANSPARENT);
    assert_eq!(palette.color_for(f32::NAN), Rgba::TRANSPARENT);
    assert_ne!(palette.color_for(5.0).a, 0);
}

#[test]
fn test_pressure_palette_after_unit_conversion() {
    let variable = VariableSpec::mean_sea_level_pressure();
    let palette = Palette::from_spec(&variable.palette).unwrap();

    // 101300 Pa is the neutral midpoint of the diverging ramp
    let color = palette.color_for(variable.transform.apply(101_300.0));
    assert_eq!(color, Rgba::new(0xff, 0xff, 0xbf, 255));
    assert_eq!(UnitTransform::PascalToHectopascal.apply(97_000.0), 970.0);
}

#[test]
fn test_alpha_channel_interpolates() {
    let spec = PaletteSpec {
        stops: vec![
            ColorStop::new(0.0, "#ff000000"),
            ColorStop::new(1.0, "#ff0000ff"),
        ],
        transparent_below: None,
    };
    let palette = Palette::from_spec(&spec).unwrap();
    assert_eq!(palette.color_for(0.5).a, 128);
}

#[test]
fn test_invalid_palettes_rejected() {
    let bad_color = PaletteSpec {
        stops: vec![ColorStop::new(0.0, "red")],
        transparent_below: None,
    };
    assert!(Palette::from_spec(&bad_color).is_err());

    let descending = PaletteSpec {
        stops: vec![ColorStop::new(10.0, "#ffffff"), ColorStop::new(0.0, "#000000")],
        transparent_below: None,
    };
    assert!(Palette::from_spec(&descending).is_err());

    let empty = PaletteSpec {
        stops: vec![],
        transparent_below: None,
    };
    assert!(Palette::from_spec(&empty).is_err());
}
