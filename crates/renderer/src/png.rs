//! PNG encoding for RGBA overlays.
//!
//! Overlays use a handful of palette colors plus full transparency, so most
//! fit in an indexed PNG (color type 3, PLTE + tRNS). Images with more than
//! 256 distinct colors fall back to truecolor with alpha (color type 6).

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

const COLOR_TYPE_INDEXED: u8 = 3;
const COLOR_TYPE_RGBA: u8 = 6;

#[derive(Error, Debug)]
pub enum PngError {
    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// Colors of an indexed image plus one palette index per pixel.
struct ColorTable {
    colors: Vec<[u8; 4]>,
    indices: Vec<u8>,
}

/// Encode RGBA pixels, choosing indexed color when the image allows it.
pub fn encode_auto(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, PngError> {
    check_buffer(pixels, width, height)?;
    match color_table(pixels) {
        Some(table) => encode_table(&table, width, height),
        None => encode_rgba(pixels, width, height),
    }
}

/// Encode RGBA pixels as a truecolor-with-alpha PNG.
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, PngError> {
    check_buffer(pixels, width, height)?;

    let mut png = Vec::with_capacity(pixels.len() / 4 + 1024);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, COLOR_TYPE_RGBA));
    write_chunk(&mut png, b"IDAT", &deflate_rows(pixels, width * 4)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Encode RGBA pixels as an indexed PNG, or None if they use more than 256 colors.
pub fn encode_indexed(
    pixels: &[u8],
    width: usize,
    height: usize,
) -> Result<Option<Vec<u8>>, PngError> {
    check_buffer(pixels, width, height)?;
    color_table(pixels)
        .map(|table| encode_table(&table, width, height))
        .transpose()
}

fn encode_table(table: &ColorTable, width: usize, height: usize) -> Result<Vec<u8>, PngError> {
    let plte: Vec<u8> = table
        .colors
        .iter()
        .flat_map(|c| [c[0], c[1], c[2]])
        .collect();

    let mut png = Vec::with_capacity(table.indices.len() / 4 + 1024);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, COLOR_TYPE_INDEXED));
    write_chunk(&mut png, b"PLTE", &plte);

    // tRNS may stop after the last non-opaque entry
    if let Some(last) = table.colors.iter().rposition(|c| c[3] < 255) {
        let alphas: Vec<u8> = table.colors[..=last].iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &alphas);
    }

    write_chunk(&mut png, b"IDAT", &deflate_rows(&table.indices, width)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn check_buffer(pixels: &[u8], width: usize, height: usize) -> Result<(), PngError> {
    if width == 0 || height == 0 || width > u32::MAX as usize || height > u32::MAX as usize {
        return Err(PngError::InvalidDimensions { width, height });
    }
    let expected = width * height * 4;
    if pixels.len() != expected {
        return Err(PngError::BufferSize {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

/// Palette in order of first appearance, None past 256 distinct colors.
fn color_table(pixels: &[u8]) -> Option<ColorTable> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut colors = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices = Vec::with_capacity(pixels.len() / 4);

    for px in pixels.chunks_exact(4) {
        let color = [px[0], px[1], px[2], px[3]];
        let index = match lookup.get(&color) {
            Some(&index) => index,
            None => {
                if colors.len() == MAX_PALETTE_SIZE {
                    return None;
                }
                let index = colors.len() as u8;
                lookup.insert(color, index);
                colors.push(color);
                index
            }
        };
        indices.push(index);
    }

    Some(ColorTable { colors, indices })
}

fn header(width: usize, height: usize, color_type: u8) -> [u8; 13] {
    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&(width as u32).to_be_bytes());
    ihdr[4..8].copy_from_slice(&(height as u32).to_be_bytes());
    ihdr[8] = 8; // bit depth
    ihdr[9] = color_type;
    // compression, filter and interlace methods all 0
    ihdr
}

/// Zlib-compress scanlines of `stride` bytes, each prefixed with filter type 0.
fn deflate_rows(data: &[u8], stride: usize) -> Result<Vec<u8>, PngError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    for row in data.chunks_exact(stride) {
        encoder.write_all(&[0])?;
        encoder.write_all(row)?;
    }
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_table_first_appearance_order() {
        let pixels = [
            255, 0, 0, 255, //
            0, 0, 0, 0, //
            255, 0, 0, 255, //
            0, 255, 0, 255,
        ];
        let table = color_table(&pixels).unwrap();
        assert_eq!(
            table.colors,
            vec![[255, 0, 0, 255], [0, 0, 0, 0], [0, 255, 0, 255]]
        );
        assert_eq!(table.indices, vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_color_table_gives_up_past_256() {
        let pixels: Vec<u8> = (0..257u32)
            .flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 0, 255])
            .collect();
        assert!(color_table(&pixels).is_none());
        assert!(color_table(&pixels[..256 * 4]).is_some());
    }

    #[test]
    fn test_buffer_checks() {
        assert!(matches!(
            encode_rgba(&[0; 12], 2, 2),
            Err(PngError::BufferSize {
                expected: 16,
                actual: 12
            })
        ));
        assert!(matches!(
            encode_auto(&[], 0, 4),
            Err(PngError::InvalidDimensions { .. })
        ));
    }
}
