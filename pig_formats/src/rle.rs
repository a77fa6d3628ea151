//! Row-table RLE used by compressed PIG bitmaps.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CursorError, FormatError};

/// Bytes with all three top bits set are run/end codes.
pub const RLE_CODE: u8 = 0xE0;
/// Mask for the run length carried by a code byte.
pub const RLE_COUNT_MASK: u8 = 0x1F;
/// Size of the leading total-size field.
pub const RLE_SIZE_PREFIX: usize = 4;

/// Decode a whole bitmap payload into `width * height` palette indices.
/// Pixels a row never reaches (early end-of-row) stay 0.
pub fn decode_rle(payload: &[u8], width: usize, height: usize) -> Result<Vec<u8>, FormatError> {
    if payload.len() < RLE_SIZE_PREFIX {
        return Err(FormatError::truncated(
            "RLE size prefix",
            CursorError::OutOfBounds {
                position: 0,
                requested: RLE_SIZE_PREFIX,
                length: payload.len(),
            },
        ));
    }

    let declared = LittleEndian::read_u32(&payload[..RLE_SIZE_PREFIX]) as usize;
    let table_end = RLE_SIZE_PREFIX + height;
    if declared < table_end {
        return Err(FormatError::UnsupportedLayout(format!(
            "RLE payload declares {declared} bytes, too small for {height} row sizes"
        )));
    }
    if payload.len() < table_end {
        return Err(FormatError::truncated(
            "RLE row size table",
            CursorError::OutOfBounds {
                position: RLE_SIZE_PREFIX,
                requested: height,
                length: payload.len(),
            },
        ));
    }

    let pixel_count = width
        .checked_mul(height)
        .ok_or_else(|| FormatError::UnsupportedLayout(format!("{width}x{height} overflows")))?;
    let mut pixels = vec![0u8; pixel_count];
    if width == 0 {
        return Ok(pixels);
    }

    let row_sizes = &payload[RLE_SIZE_PREFIX..table_end];
    let mut row_start = table_end;
    for (row, (&row_size, dest)) in row_sizes
        .iter()
        .zip(pixels.chunks_exact_mut(width))
        .enumerate()
    {
        let src = payload.get(row_start..).unwrap_or(&[]);
        expand_scanline(src, dest).map_err(|source| {
            let source = match source {
                CursorError::OutOfBounds {
                    position,
                    requested,
                    ..
                } => CursorError::OutOfBounds {
                    position: row_start + position,
                    requested,
                    length: payload.len(),
                },
            };
            FormatError::truncated(format!("RLE row {row}"), source)
        })?;
        row_start += row_size as usize;
    }

    Ok(pixels)
}

/// Expand one encoded row into `dest`, stopping when `dest` is full or an
/// end-of-row code is met.
fn expand_scanline(src: &[u8], dest: &mut [u8]) -> Result<(), CursorError> {
    let mut read = 0usize;
    let mut written = 0usize;
    let next = |read: &mut usize| -> Result<u8, CursorError> {
        let byte = *src.get(*read).ok_or(CursorError::OutOfBounds {
            position: *read,
            requested: 1,
            length: src.len(),
        })?;
        *read += 1;
        Ok(byte)
    };

    while written < dest.len() {
        let byte = next(&mut read)?;
        if byte & RLE_CODE != RLE_CODE {
            dest[written] = byte;
            written += 1;
            continue;
        }

        let count = (byte & RLE_COUNT_MASK) as usize;
        if count == 0 {
            break;
        }
        let value = next(&mut read)?;
        let end = (written + count).min(dest.len());
        dest[written..end].fill(value);
        written = end;
    }

    Ok(())
}
