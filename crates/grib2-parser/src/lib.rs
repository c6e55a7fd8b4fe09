//! GRIB2 parser (WMO FM 92 GRIB Edition 2) for HRRR overlay rendering.
//!
//! Sections are parsed natively. Simple packing (template 5.0) is unpacked
//! here; any other data representation is delegated to the `grib` crate,
//! which handles the complex packing HRRR files are distributed with.
//!
//! ```ignore
//! let field = grib2_parser::decode_field(&payload, &spec.selector)?;
//! let (cols, rows) = field.grid.dimensions().unwrap_or_default();
//! ```

pub mod message;
pub mod sections;
pub mod tables;
pub mod unpacking;

use std::io::Cursor;

use chrono::{DateTime, Utc};
use overlay_common::FieldSelector;
use thiserror::Error;
use tracing::{debug, warn};

pub use message::{parse_payload, split_messages, Grib2Field};
pub use sections::{GridTemplate, LambertGrid, LatLonGrid, ScanningMode};
pub use unpacking::{unpack_simple, SimplePacking};

/// Errors raised while parsing or decoding GRIB2 data.
#[derive(Error, Debug)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unsupported {what}: {value}")]
    Unsupported { what: &'static str, value: u32 },

    #[error("Unpacking error: {0}")]
    UnpackingError(String),

    #[error("No field {wanted} in payload (found: {found})")]
    FieldNotFound { wanted: String, found: String },
}

/// A fully decoded field: grid geometry plus one value per grid point.
#[derive(Debug, Clone)]
pub struct DecodedField {
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
    pub surface_type: u8,
    pub surface_value: Option<f64>,
    pub reference_time: DateTime<Utc>,
    pub forecast_hour: Option<u32>,
    pub grid: GridTemplate,
    /// Values in file scan order; NaN marks missing points
    pub values: Vec<f32>,
}

impl DecodedField {
    pub fn short_name(&self) -> String {
        tables::parameter_short_name(self.discipline, self.category, self.number)
    }

    /// Number of non-missing values.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// (min, max) over non-missing values, or None if every point is missing.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

fn matches_selector(field: &Grib2Field<'_>, selector: &FieldSelector) -> bool {
    let product = &field.product;
    let surface_matches = match (selector.surface_value, product.surface_value) {
        (None, _) => true,
        (Some(wanted), Some(actual)) => (wanted - actual).abs() < 1e-6,
        (Some(_), None) => false,
    };

    field.indicator.discipline == selector.discipline
        && product.parameter_category == selector.category
        && product.parameter_number == selector.number
        && product.surface_type == selector.surface_type
        && surface_matches
}

fn describe(field: &Grib2Field<'_>) -> String {
    format!(
        "{}@{}",
        tables::parameter_short_name(
            field.indicator.discipline,
            field.product.parameter_category,
            field.product.parameter_number
        ),
        tables::surface_description(field.product.surface_type, field.product.surface_value)
    )
}

/// Find and decode the first field in `payload` matching `selector`.
///
/// A payload holding exactly one field is decoded even when it doesn't match,
/// since the upstream filter already narrowed it to the requested variable.
pub fn decode_field(payload: &[u8], selector: &FieldSelector) -> Result<DecodedField, Grib2Error> {
    let fields = parse_payload(payload)?;

    if let Some(field) = fields.iter().find(|f| matches_selector(f, selector)) {
        return decode(field);
    }

    if let [only] = fields.as_slice() {
        warn!(
            found = %describe(only),
            category = selector.category,
            number = selector.number,
            "Payload holds a single non-matching field, decoding it anyway"
        );
        return decode(only);
    }

    Err(Grib2Error::FieldNotFound {
        wanted: format!(
            "{}@{}",
            tables::parameter_short_name(selector.discipline, selector.category, selector.number),
            tables::surface_description(selector.surface_type, selector.surface_value)
        ),
        found: fields.iter().map(describe).collect::<Vec<_>>().join(", "),
    })
}

/// Which unpacker decodes a field's data section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Unpacker {
    /// Simple packing natively, every other template through the `grib` crate
    #[default]
    Auto,
    /// Every template through the `grib` crate
    GribCrate,
}

/// Decode the values of a parsed field.
pub fn decode(field: &Grib2Field<'_>) -> Result<DecodedField, Grib2Error> {
    decode_with(field, Unpacker::Auto)
}

/// Decode the values of a parsed field with an explicit unpacker.
pub fn decode_with(
    field: &Grib2Field<'_>,
    unpacker: Unpacker,
) -> Result<DecodedField, Grib2Error> {
    if let GridTemplate::Other { template, .. } = field.grid {
        return Err(Grib2Error::Unsupported {
            what: "grid definition template",
            value: template as u32,
        });
    }
    if let Some(scan) = field.grid.scanning_mode() {
        if scan.j_consecutive() || scan.boustrophedon() {
            return Err(Grib2Error::Unsupported {
                what: "scanning mode",
                value: scan.0 as u32,
            });
        }
    }

    let num_points = field.grid.num_points();
    let representation = &field.representation;

    let values = if representation.template == 0 && unpacker == Unpacker::Auto {
        let packing = SimplePacking {
            reference_value: representation.reference_value,
            binary_scale_factor: representation.binary_scale_factor,
            decimal_scale_factor: representation.decimal_scale_factor,
            bits_per_value: representation.bits_per_value,
        };
        unpack_simple(
            field.data,
            num_points,
            representation.num_data_points as usize,
            packing,
            field.bitmap,
        )?
    } else {
        debug!(
            template = representation.template,
            ?unpacker,
            "Delegating data representation to grib crate"
        );
        unpack_with_grib_crate(field)?
    };

    if values.len() != num_points {
        return Err(Grib2Error::UnpackingError(format!(
            "decoded {} values for {} grid points",
            values.len(),
            num_points
        )));
    }

    Ok(DecodedField {
        discipline: field.indicator.discipline,
        category: field.product.parameter_category,
        number: field.product.parameter_number,
        surface_type: field.product.surface_type,
        surface_value: field.product.surface_value,
        reference_time: field.identification.reference_time,
        forecast_hour: field.product.forecast_hour,
        grid: field.grid.clone(),
        values,
    })
}

fn unpack_with_grib_crate(field: &Grib2Field<'_>) -> Result<Vec<f32>, Grib2Error> {
    let crate_error = |e: grib::GribError| Grib2Error::UnpackingError(format!("grib crate: {}", e));

    let grib2 = grib::from_reader(Cursor::new(field.message)).map_err(crate_error)?;
    let (_, submessage) = grib2.iter().nth(field.submessage).ok_or_else(|| {
        Grib2Error::UnpackingError(format!(
            "grib crate found no submessage {}",
            field.submessage
        ))
    })?;

    let decoder = grib::Grib2SubmessageDecoder::from(submessage).map_err(crate_error)?;
    let values = decoder.dispatch().map_err(crate_error)?;
    Ok(values.collect())
}
