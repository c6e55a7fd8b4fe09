//! GRIB2 section parsing.
//!
//! Every parse function takes the full byte slice of one section (starting at
//! its 4-byte length field) and reads template fields at fixed offsets. Signed
//! GRIB2 integers use sign-magnitude encoding (the MSB is the sign bit), not
//! two's complement.

use chrono::{DateTime, NaiveDate, Utc};

use crate::Grib2Error;

/// Radius used when the shape-of-earth code names a sphere we don't special-case.
pub const DEFAULT_EARTH_RADIUS: f64 = 6_371_229.0;

const MISSING_U32: u32 = u32::MAX;

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
}

/// Scanning mode flags (Flag Table 3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanningMode(pub u8);

impl ScanningMode {
    /// Points scan in the -i (westward) direction
    pub fn i_negative(self) -> bool {
        self.0 & 0x80 != 0
    }

    /// Points scan in the +j (northward) direction
    pub fn j_positive(self) -> bool {
        self.0 & 0x40 != 0
    }

    /// Adjacent points in j are consecutive (column-major)
    pub fn j_consecutive(self) -> bool {
        self.0 & 0x20 != 0
    }

    /// Alternate rows scan in opposite directions
    pub fn boustrophedon(self) -> bool {
        self.0 & 0x10 != 0
    }
}

/// Template 3.0: regular latitude/longitude grid. Angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLonGrid {
    pub ni: u32,
    pub nj: u32,
    pub la1: f64,
    pub lo1: f64,
    pub la2: f64,
    pub lo2: f64,
    pub di: f64,
    pub dj: f64,
    pub scanning_mode: ScanningMode,
}

/// Template 3.30: Lambert conformal conic grid. Angles in degrees, lengths in meters.
#[derive(Debug, Clone, PartialEq)]
pub struct LambertGrid {
    pub nx: u32,
    pub ny: u32,
    pub la1: f64,
    pub lo1: f64,
    pub lad: f64,
    pub lov: f64,
    pub dx: f64,
    pub dy: f64,
    pub latin1: f64,
    pub latin2: f64,
    pub projection_centre: u8,
    pub scanning_mode: ScanningMode,
    pub earth_radius: f64,
}

/// Section 3: Grid Definition Section
#[derive(Debug, Clone, PartialEq)]
pub enum GridTemplate {
    LatLon(LatLonGrid),
    LambertConformal(LambertGrid),
    /// Any other template; only the point count is known
    Other { template: u16, num_points: u32 },
}

impl GridTemplate {
    pub fn num_points(&self) -> usize {
        match self {
            GridTemplate::LatLon(g) => g.ni as usize * g.nj as usize,
            GridTemplate::LambertConformal(g) => g.nx as usize * g.ny as usize,
            GridTemplate::Other { num_points, .. } => *num_points as usize,
        }
    }

    /// (columns, rows) for supported templates.
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        match self {
            GridTemplate::LatLon(g) => Some((g.ni as usize, g.nj as usize)),
            GridTemplate::LambertConformal(g) => Some((g.nx as usize, g.ny as usize)),
            GridTemplate::Other { .. } => None,
        }
    }

    pub fn scanning_mode(&self) -> Option<ScanningMode> {
        match self {
            GridTemplate::LatLon(g) => Some(g.scanning_mode),
            GridTemplate::LambertConformal(g) => Some(g.scanning_mode),
            GridTemplate::Other { .. } => None,
        }
    }
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    /// Forecast time converted to hours, when the time unit is understood
    pub forecast_hour: Option<u32>,
    pub surface_type: u8,
    pub surface_value: Option<f64>,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone, PartialEq)]
pub struct DataRepresentation {
    /// Number of packed values (grid points minus bitmap-masked ones)
    pub num_data_points: u32,
    pub template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

// ===== Integer helpers =====

/// Decode a 4-byte GRIB2 sign-magnitude integer. Slices of any other length decode as 0.
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    match <[u8; 4]>::try_from(bytes) {
        Ok(raw) => {
            let value = u32::from_be_bytes(raw);
            let magnitude = (value & 0x7FFF_FFFF) as i32;
            if value & 0x8000_0000 != 0 {
                -magnitude
            } else {
                magnitude
            }
        }
        Err(_) => 0,
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_i16_sm(data: &[u8], offset: usize) -> i16 {
    let value = read_u16(data, offset);
    let magnitude = (value & 0x7FFF) as i16;
    if value & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn read_i8_sm(value: u8) -> i8 {
    let magnitude = (value & 0x7F) as i8;
    if value & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn require_len(section: &[u8], number: u8, needed: usize) -> Result<(), Grib2Error> {
    if section.len() < needed {
        return Err(Grib2Error::InvalidSection {
            section: number,
            reason: format!("needs at least {} bytes, got {}", needed, section.len()),
        });
    }
    Ok(())
}

/// Length and number of the section starting at `data[0]`.
pub fn section_header(data: &[u8]) -> Option<(usize, u8)> {
    if data.len() < 5 {
        return None;
    }
    Some((read_u32(data, 0) as usize, data[4]))
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from the start of a message.
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "not enough data for indicator section".to_string(),
        ));
    }
    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat("invalid GRIB magic bytes".to_string()));
    }

    let discipline = data[6];
    let edition = data[7];
    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "expected GRIB edition 2, got {}",
            edition
        )));
    }

    let mut length = [0u8; 8];
    length.copy_from_slice(&data[8..16]);

    Ok(Indicator {
        discipline,
        edition,
        message_length: u64::from_be_bytes(length),
    })
}

/// Parse Section 1 (Identification).
pub fn parse_identification(section: &[u8]) -> Result<Identification, Grib2Error> {
    require_len(section, 1, 21)?;

    let center = read_u16(section, 5);
    let sub_center = read_u16(section, 7);
    let significance_of_reference_time = section[11];

    let year = read_u16(section, 12);
    let (month, day) = (section[14], section[15]);
    let (hour, minute, second) = (section[16], section[17], section[18]);

    let naive = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "invalid reference time: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        significance_of_reference_time,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
    })
}

/// Parse Section 3 (Grid Definition).
pub fn parse_grid_definition(section: &[u8]) -> Result<GridTemplate, Grib2Error> {
    require_len(section, 3, 14)?;

    let num_points = read_u32(section, 6);
    let template = read_u16(section, 12);

    // Template data starts at byte 14
    let gd = &section[14..];

    match template {
        0 => {
            require_len(gd, 3, 58)?;

            let ni = read_u32(gd, 16);
            let nj = read_u32(gd, 20);
            let basic_angle = read_u32(gd, 24);
            let subdivisions = read_u32(gd, 28);

            // Angles are in microdegrees unless an explicit basic angle is given
            let unit = if basic_angle != 0
                && basic_angle != MISSING_U32
                && subdivisions != 0
                && subdivisions != MISSING_U32
            {
                basic_angle as f64 / subdivisions as f64
            } else {
                1e-6
            };

            let grid = LatLonGrid {
                ni,
                nj,
                la1: decode_grib2_signed(&gd[32..36]) as f64 * unit,
                lo1: decode_grib2_signed(&gd[36..40]) as f64 * unit,
                la2: decode_grib2_signed(&gd[41..45]) as f64 * unit,
                lo2: decode_grib2_signed(&gd[45..49]) as f64 * unit,
                di: read_u32(gd, 49) as f64 * unit,
                dj: read_u32(gd, 53) as f64 * unit,
                scanning_mode: ScanningMode(gd[57]),
            };
            check_point_count(num_points, grid.ni, grid.nj)?;
            Ok(GridTemplate::LatLon(grid))
        }
        30 => {
            require_len(gd, 3, 59)?;

            let grid = LambertGrid {
                nx: read_u32(gd, 16),
                ny: read_u32(gd, 20),
                la1: decode_grib2_signed(&gd[24..28]) as f64 * 1e-6,
                lo1: decode_grib2_signed(&gd[28..32]) as f64 * 1e-6,
                lad: decode_grib2_signed(&gd[33..37]) as f64 * 1e-6,
                lov: decode_grib2_signed(&gd[37..41]) as f64 * 1e-6,
                // Dx/Dy are in millimeters
                dx: read_u32(gd, 41) as f64 * 1e-3,
                dy: read_u32(gd, 45) as f64 * 1e-3,
                projection_centre: gd[49],
                scanning_mode: ScanningMode(gd[50]),
                latin1: decode_grib2_signed(&gd[51..55]) as f64 * 1e-6,
                latin2: decode_grib2_signed(&gd[55..59]) as f64 * 1e-6,
                earth_radius: earth_radius(gd[0], gd[1], read_u32(gd, 2)),
            };
            check_point_count(num_points, grid.nx, grid.ny)?;
            Ok(GridTemplate::LambertConformal(grid))
        }
        other => Ok(GridTemplate::Other {
            template: other,
            num_points,
        }),
    }
}

fn check_point_count(declared: u32, cols: u32, rows: u32) -> Result<(), Grib2Error> {
    if declared as u64 != cols as u64 * rows as u64 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("{} points declared for a {}x{} grid", declared, cols, rows),
        });
    }
    Ok(())
}

/// Earth radius for a shape-of-earth code (Code Table 3.2).
fn earth_radius(shape: u8, scale: u8, scaled_value: u32) -> f64 {
    match shape {
        0 => 6_367_470.0,
        1 if scaled_value != 0 && scaled_value != MISSING_U32 => {
            scaled_value as f64 / 10f64.powi(read_i8_sm(scale) as i32)
        }
        _ => DEFAULT_EARTH_RADIUS,
    }
}

/// Parse Section 4 (Product Definition).
///
/// Templates 4.0 to 4.15 share the layout of the fields read here.
pub fn parse_product_definition(section: &[u8]) -> Result<ProductDefinition, Grib2Error> {
    require_len(section, 4, 11)?;

    let template = read_u16(section, 7);
    let parameter_category = section[9];
    let parameter_number = section[10];

    if template > 15 || section.len() < 34 {
        return Ok(ProductDefinition {
            template,
            parameter_category,
            parameter_number,
            forecast_hour: None,
            surface_type: 255,
            surface_value: None,
        });
    }

    let time_unit = section[17];
    let forecast_time = read_u32(section, 18);
    let forecast_hour = match time_unit {
        0 => Some(forecast_time / 60),
        1 => Some(forecast_time),
        2 => Some(forecast_time * 24),
        10 => Some(forecast_time * 3),
        11 => Some(forecast_time * 6),
        12 => Some(forecast_time * 12),
        13 => Some(forecast_time / 3600),
        _ => None,
    };

    let surface_type = section[22];
    let scale = section[23];
    let scaled = read_u32(section, 24);
    let surface_value = if scale == 0xFF && scaled == MISSING_U32 {
        None
    } else {
        Some(scaled as f64 / 10f64.powi(read_i8_sm(scale) as i32))
    };

    Ok(ProductDefinition {
        template,
        parameter_category,
        parameter_number,
        forecast_hour,
        surface_type,
        surface_value,
    })
}

/// Parse Section 5 (Data Representation).
///
/// The scale factors and bit width are read for every template; templates 5.0
/// through 5.3 and 5.40/5.41 all start with the same simple-packing header.
pub fn parse_data_representation(section: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    require_len(section, 5, 21)?;

    let reference_value = f32::from_be_bytes([section[11], section[12], section[13], section[14]]);

    Ok(DataRepresentation {
        num_data_points: read_u32(section, 5),
        template: read_u16(section, 9),
        reference_value,
        binary_scale_factor: read_i16_sm(section, 15),
        decimal_scale_factor: read_i16_sm(section, 17),
        bits_per_value: section[19],
    })
}

/// Bitmap carried by Section 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapIndicator<'a> {
    /// 0: bitmap follows
    Present(&'a [u8]),
    /// 254: reuse the bitmap defined earlier in the message
    Previous,
    /// 255: every grid point has a value
    None,
}

/// Parse Section 6 (Bitmap).
pub fn parse_bitmap(section: &[u8]) -> Result<BitmapIndicator<'_>, Grib2Error> {
    require_len(section, 6, 6)?;

    match section[5] {
        0 => Ok(BitmapIndicator::Present(&section[6..])),
        254 => Ok(BitmapIndicator::Previous),
        255 => Ok(BitmapIndicator::None),
        other => Err(Grib2Error::Unsupported {
            what: "predefined bitmap",
            value: other as u32,
        }),
    }
}

/// Parse Section 7 (Data): the packed payload after the 5-byte header.
pub fn parse_data_section(section: &[u8]) -> Result<&[u8], Grib2Error> {
    require_len(section, 7, 5)?;
    Ok(&section[5..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_magnitude_helpers() {
        assert_eq!(read_i16_sm(&[0x80, 0x02], 0), -2);
        assert_eq!(read_i16_sm(&[0x00, 0x02], 0), 2);
        assert_eq!(read_i8_sm(0x81), -1);
        assert_eq!(read_i8_sm(0x01), 1);
    }

    #[test]
    fn test_indicator_rejects_edition_one() {
        let mut data = vec![0u8; 16];
        data[0..4].copy_from_slice(b"GRIB");
        data[7] = 1;
        assert!(parse_indicator(&data).is_err());
    }

    #[test]
    fn test_scanning_mode_flags() {
        let hrrr = ScanningMode(0x40);
        assert!(hrrr.j_positive());
        assert!(!hrrr.i_negative());
        assert!(!hrrr.j_consecutive());

        let gfs = ScanningMode(0x00);
        assert!(!gfs.j_positive());
    }

    #[test]
    fn test_earth_radius_codes() {
        assert_eq!(earth_radius(6, 0, 0), DEFAULT_EARTH_RADIUS);
        assert_eq!(earth_radius(0, 0, 0), 6_367_470.0);
        assert_eq!(earth_radius(1, 0, 6_371_000), 6_371_000.0);
    }
}
