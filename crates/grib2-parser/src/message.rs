//! Splitting a payload into messages and messages into fields.
//!
//! A GRIB2 message may repeat sections 2-7 (or 3-7, or 4-7) to carry several
//! fields that share earlier sections. Each Section 7 closes one field.

use crate::sections::{
    self, BitmapIndicator, DataRepresentation, GridTemplate, Identification, Indicator,
    ProductDefinition,
};
use crate::Grib2Error;

/// One field inside a GRIB2 message, borrowing from the payload.
#[derive(Debug, Clone)]
pub struct Grib2Field<'a> {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid: GridTemplate,
    pub product: ProductDefinition,
    pub representation: DataRepresentation,
    pub bitmap: Option<&'a [u8]>,
    pub data: &'a [u8],
    /// Full bytes of the enclosing message
    pub message: &'a [u8],
    /// Position of this field within its message
    pub submessage: usize,
}

/// Split a payload into the byte ranges of its GRIB2 messages.
///
/// Bytes between messages are skipped. A payload with no message at all is an error.
pub fn split_messages(data: &[u8]) -> Result<Vec<&[u8]>, Grib2Error> {
    let mut messages = Vec::new();
    let mut offset = 0usize;

    while let Some(start) = find_magic(data, offset) {
        let indicator = sections::parse_indicator(&data[start..])?;
        let length = usize::try_from(indicator.message_length).map_err(|_| {
            Grib2Error::InvalidFormat(format!(
                "message length {} does not fit in memory",
                indicator.message_length
            ))
        })?;

        if length < 16 + 4 || start + length > data.len() {
            return Err(Grib2Error::InvalidFormat(format!(
                "message at offset {} declares {} bytes, {} available",
                start,
                length,
                data.len() - start
            )));
        }

        let message = &data[start..start + length];
        if &message[length - 4..] != b"7777" {
            return Err(Grib2Error::InvalidFormat(format!(
                "message at offset {} is missing its end marker",
                start
            )));
        }

        messages.push(message);
        offset = start + length;
    }

    if messages.is_empty() {
        return Err(Grib2Error::InvalidFormat(
            "no GRIB2 message found in payload".to_string(),
        ));
    }
    Ok(messages)
}

fn find_magic(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(4)
        .position(|w| w == b"GRIB")
        .map(|pos| from + pos)
}

/// Parse every field of one message.
pub fn parse_fields(message: &[u8]) -> Result<Vec<Grib2Field<'_>>, Grib2Error> {
    let indicator = sections::parse_indicator(message)?;

    let mut identification: Option<Identification> = None;
    let mut grid: Option<GridTemplate> = None;
    let mut product: Option<ProductDefinition> = None;
    let mut representation: Option<DataRepresentation> = None;
    let mut bitmap: Option<&[u8]> = None;
    let mut previous_bitmap: Option<&[u8]> = None;

    let mut fields = Vec::new();
    let mut offset = 16;

    loop {
        let (length, number) = match sections::section_header(&message[offset..]) {
            Some(header) => header,
            None if &message[offset..] == b"7777" => break,
            None => {
                return Err(Grib2Error::InvalidFormat(format!(
                    "truncated section header at offset {}",
                    offset
                )))
            }
        };

        if &message[offset..offset + 4] == b"7777" {
            break;
        }
        if length < 5 || offset + length > message.len() {
            return Err(Grib2Error::InvalidSection {
                section: number,
                reason: format!("invalid section length {} at offset {}", length, offset),
            });
        }

        let section = &message[offset..offset + length];
        match number {
            1 => identification = Some(sections::parse_identification(section)?),
            2 => {}
            3 => grid = Some(sections::parse_grid_definition(section)?),
            4 => product = Some(sections::parse_product_definition(section)?),
            5 => representation = Some(sections::parse_data_representation(section)?),
            6 => {
                bitmap = match sections::parse_bitmap(section)? {
                    BitmapIndicator::Present(bits) => {
                        previous_bitmap = Some(bits);
                        Some(bits)
                    }
                    BitmapIndicator::Previous => Some(previous_bitmap.ok_or_else(|| {
                        Grib2Error::InvalidSection {
                            section: 6,
                            reason: "reuses a bitmap that was never defined".to_string(),
                        }
                    })?),
                    BitmapIndicator::None => None,
                };
            }
            7 => {
                let missing = |n: u8| Grib2Error::InvalidSection {
                    section: n,
                    reason: "required before section 7".to_string(),
                };
                fields.push(Grib2Field {
                    indicator,
                    identification: identification.clone().ok_or_else(|| missing(1))?,
                    grid: grid.clone().ok_or_else(|| missing(3))?,
                    product: product.clone().ok_or_else(|| missing(4))?,
                    representation: representation.clone().ok_or_else(|| missing(5))?,
                    bitmap,
                    data: sections::parse_data_section(section)?,
                    message,
                    submessage: fields.len(),
                });
            }
            other => {
                return Err(Grib2Error::InvalidSection {
                    section: other,
                    reason: "unknown section number".to_string(),
                })
            }
        }

        offset += length;
    }

    Ok(fields)
}

/// Parse every field of every message in a payload.
pub fn parse_payload(data: &[u8]) -> Result<Vec<Grib2Field<'_>>, Grib2Error> {
    let mut fields = Vec::new();
    for message in split_messages(data)? {
        fields.extend(parse_fields(message)?);
    }
    Ok(fields)
}
