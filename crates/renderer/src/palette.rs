//! Color palettes built from configured stops.

use overlay_common::{ConfigError, PaletteSpec};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional).
    pub fn parse_hex(text: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidColor(text.to_string());
        let hex = text.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |at: usize| u8::from_str_radix(&hex[at..at + 2], 16).map_err(|_| invalid());
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, a))
    }

    fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgba::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

/// Maps physical values to colors by linear interpolation between stops.
#[derive(Debug, Clone)]
pub struct Palette {
    values: Vec<f32>,
    colors: Vec<Rgba>,
    transparent_below: Option<f32>,
}

impl Palette {
    /// Build a palette, parsing every stop color.
    ///
    /// Stops must be non-empty and strictly ascending.
    pub fn from_spec(spec: &PaletteSpec) -> Result<Self, ConfigError> {
        if spec.stops.is_empty() {
            return Err(ConfigError::variable("palette", "needs at least one stop"));
        }
        if spec.stops.windows(2).any(|w| w[0].value >= w[1].value) {
            return Err(ConfigError::variable(
                "palette",
                "stops must be in strictly ascending order",
            ));
        }

        let colors = spec
            .stops
            .iter()
            .map(|stop| Rgba::parse_hex(&stop.color))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            values: spec.stops.iter().map(|stop| stop.value).collect(),
            colors,
            transparent_below: spec.transparent_below,
        })
    }

    /// Color for a value already converted to display units.
    ///
    /// NaN and values under the transparency threshold map to fully
    /// transparent; values outside the stop range take the nearest end color.
    pub fn color_for(&self, value: f32) -> Rgba {
        if value.is_nan() {
            return Rgba::TRANSPARENT;
        }
        if matches!(self.transparent_below, Some(threshold) if value < threshold) {
            return Rgba::TRANSPARENT;
        }

        let last = self.values.len() - 1;
        if value <= self.values[0] {
            return self.colors[0];
        }
        if value >= self.values[last] {
            return self.colors[last];
        }

        // First stop strictly above the value; 1..=last given the checks above
        let hi = self.values.partition_point(|&v| v <= value);
        let lo = hi - 1;
        let t = (value - self.values[lo]) / (self.values[hi] - self.values[lo]);
        self.colors[lo].lerp(self.colors[hi], t)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgba::parse_hex("#FF0000").unwrap(), Rgba::new(255, 0, 0, 255));
        assert_eq!(Rgba::parse_hex("04e9e7").unwrap(), Rgba::new(4, 233, 231, 255));
        assert_eq!(
            Rgba::parse_hex("#00ff0080").unwrap(),
            Rgba::new(0, 255, 0, 128)
        );
        assert!(Rgba::parse_hex("#GGGGGG").is_err());
        assert!(Rgba::parse_hex("#fff").is_err());
        assert!(Rgba::parse_hex("").is_err());
    }

    #[test]
    fn test_lerp_endpoints() {
        let black = Rgba::new(0, 0, 0, 255);
        let white = Rgba::new(200, 200, 200, 255);
        assert_eq!(black.lerp(white, 0.0), black);
        assert_eq!(black.lerp(white, 1.0), white);
        assert_eq!(black.lerp(white, 0.5), Rgba::new(100, 100, 100, 255));
    }
}
