//! PNG encoding for 1-bit frames.
//!
//! Frames are written as grayscale PNG (color type 0) at bit depth 1, which
//! maps directly onto the packed row layout of [`crate::frame::Frame`]:
//! MSB first, rows padded to whole bytes, 1 = white.

use std::io::Write;

/// PNG file signature
const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Bytes per packed row at one bit per pixel.
pub fn packed_row_len(width: usize) -> usize {
    (width + 7) / 8
}

/// Create a 1-bit grayscale PNG from packed rows.
///
/// # Arguments
/// - `packed`: `height` rows of `packed_row_len(width)` bytes each
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
pub fn create_png_mono(packed: &[u8], width: usize, height: usize) -> Result<Vec<u8>, String> {
    let row_len = packed_row_len(width);
    if packed.len() != row_len * height {
        return Err(format!(
            "Packed data is {} bytes, expected {} for {}x{}",
            packed.len(),
            row_len * height,
            width,
            height
        ));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&SIGNATURE);

    // IHDR chunk
    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(1); // bit depth
    ihdr_data.push(0); // color type (grayscale)
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    let idat_data = deflate_idat_mono(packed, row_len, height)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Write a PNG chunk with length, type, data, and CRC.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let crc_data = [chunk_type.as_slice(), data].concat();
    let crc = crc32fast::hash(&crc_data);
    png.extend_from_slice(&crc.to_be_bytes());
}

fn deflate_idat_mono(
    packed: &[u8],
    row_len: usize,
    height: usize,
) -> Result<Vec<u8>, std::io::Error> {
    // Filter byte (0 = none) before each scanline
    let mut uncompressed = Vec::with_capacity(height * (1 + row_len));
    for row in packed.chunks_exact(row_len.max(1)).take(height) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(&uncompressed)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_row_len() {
        assert_eq!(packed_row_len(1), 1);
        assert_eq!(packed_row_len(8), 1);
        assert_eq!(packed_row_len(9), 2);
        assert_eq!(packed_row_len(264), 33);
    }

    #[test]
    fn test_ihdr_is_one_bit_grayscale() {
        let png = create_png_mono(&[0b1010_0000, 0b0101_0000], 4, 2).unwrap();
        assert_eq!(&png[0..8], &SIGNATURE);
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(u32::from_be_bytes([png[16], png[17], png[18], png[19]]), 4);
        assert_eq!(u32::from_be_bytes([png[20], png[21], png[22], png[23]]), 2);
        assert_eq!(png[24], 1);
        assert_eq!(png[25], 0);
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = create_png_mono(&[0u8; 3], 9, 2).unwrap_err();
        assert!(err.contains("expected 4"));
    }
}
