//! GRIB2 data unpacking.
//!
//! Simple packing (template 5.0) is decoded here. Other packings are handed to
//! the `grib` crate by the caller.

use crate::Grib2Error;

/// Parameters of a simple-packed field.
#[derive(Debug, Clone, Copy)]
pub struct SimplePacking {
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

impl SimplePacking {
    /// Y = (R + X * 2^E) * 10^-D
    #[inline]
    fn value(&self, packed: u32, binary_scale: f64, decimal_scale: f64) -> f32 {
        ((self.reference_value as f64 + packed as f64 * binary_scale) * decimal_scale) as f32
    }
}

/// Unpack simple-packed data onto `num_grid_points` values.
///
/// When a bitmap is given, packed values exist only for points whose bit is set;
/// masked points come back as NaN. Without a bitmap, `packed_count` must equal
/// `num_grid_points`.
pub fn unpack_simple(
    packed_data: &[u8],
    num_grid_points: usize,
    packed_count: usize,
    packing: SimplePacking,
    bitmap: Option<&[u8]>,
) -> Result<Vec<f32>, Grib2Error> {
    if bitmap.is_none() && packed_count != num_grid_points {
        return Err(Grib2Error::UnpackingError(format!(
            "{} packed values for {} grid points without a bitmap",
            packed_count, num_grid_points
        )));
    }
    if let Some(bm) = bitmap {
        if bm.len() * 8 < num_grid_points {
            return Err(Grib2Error::UnpackingError(format!(
                "bitmap covers {} points, grid has {}",
                bm.len() * 8,
                num_grid_points
            )));
        }
    }
    if packing.bits_per_value > 32 {
        return Err(Grib2Error::UnpackingError(format!(
            "invalid number of bits per value: {}",
            packing.bits_per_value
        )));
    }

    let bits = packing.bits_per_value as usize;
    let needed_bytes = (packed_count * bits).div_ceil(8);
    if packed_data.len() < needed_bytes {
        return Err(Grib2Error::UnpackingError(format!(
            "data section holds {} bytes, {} needed",
            packed_data.len(),
            needed_bytes
        )));
    }

    let binary_scale = 2f64.powi(packing.binary_scale_factor as i32);
    let decimal_scale = 10f64.powi(-(packing.decimal_scale_factor as i32));

    let mut reader = BitReader::new(packed_data);
    let mut values = Vec::with_capacity(num_grid_points);
    let mut consumed = 0usize;

    for i in 0..num_grid_points {
        let present = match bitmap {
            // 1 bit per grid point, MSB first, 1 = value present
            Some(bm) => (bm[i / 8] >> (7 - (i % 8))) & 1 == 1,
            None => true,
        };

        if !present {
            values.push(f32::NAN);
            continue;
        }

        if consumed == packed_count {
            return Err(Grib2Error::UnpackingError(
                "bitmap marks more points than were packed".to_string(),
            ));
        }
        consumed += 1;

        // Zero-width fields are constant at the reference value
        let packed = if bits == 0 { 0 } else { reader.read(bits) };
        values.push(packing.value(packed, binary_scale, decimal_scale));
    }

    Ok(values)
}

/// MSB-first bit reader over a byte slice. Callers check the length up front.
struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn read(&mut self, num_bits: usize) -> u32 {
        let mut result = 0u64;
        let mut remaining = num_bits;

        while remaining > 0 {
            let byte = self.data[self.position / 8];
            let offset = self.position % 8;
            let take = remaining.min(8 - offset);
            let shift = 8 - offset - take;
            let chunk = (byte >> shift) & ((1u16 << take) - 1) as u8;

            result = (result << take) | chunk as u64;
            self.position += take;
            remaining -= take;
        }

        result as u32
    }
}
