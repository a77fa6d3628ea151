use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::error::CursorError;

/// Little-endian reader over a window of a shared, immutable buffer.
///
/// Cloning a cursor or spawning a sub-cursor never copies the backing bytes;
/// every cursor holds a reference-counted handle plus its own window
/// (`base_offset`, `len`) and read position. Positions are relative to the
/// window. Any read that would leave the window fails with
/// [`CursorError::OutOfBounds`] instead of touching neighbouring data.
#[derive(Debug, Clone)]
pub struct ByteCursor {
    data: Bytes,
    base: usize,
    len: usize,
    position: usize,
}

impl ByteCursor {
    /// Cursor spanning the whole buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len();
        ByteCursor {
            data,
            base: 0,
            len,
            position: 0,
        }
    }

    /// Cursor over `data[base..base + len]`. When `len` is `None` the window
    /// extends to the end of the buffer.
    pub fn with_window(
        data: impl Into<Bytes>,
        base: usize,
        len: Option<usize>,
    ) -> Result<Self, CursorError> {
        let data = data.into();
        let available = data.len().saturating_sub(base);
        let len = len.unwrap_or(available);
        if base > data.len() || len > available {
            return Err(CursorError::OutOfBounds {
                position: base,
                requested: len,
                length: data.len(),
            });
        }
        Ok(ByteCursor {
            data,
            base,
            len,
            position: 0,
        })
    }

    /// New cursor over `offset..offset + len` of this cursor's window,
    /// sharing the same backing buffer. The child starts at position 0.
    pub fn sub_cursor(&self, offset: usize, len: usize) -> Result<ByteCursor, CursorError> {
        let end = offset.checked_add(len);
        if end.is_none_or(|end| end > self.len) {
            return Err(CursorError::OutOfBounds {
                position: offset,
                requested: len,
                length: self.len,
            });
        }
        Ok(ByteCursor {
            data: self.data.clone(),
            base: self.base + offset,
            len,
            position: 0,
        })
    }

    /// Absolute offset of this window inside the backing buffer.
    #[inline]
    pub fn base_offset(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn tell(&self) -> usize {
        self.position
    }

    /// Move to `position` within the window. Seeking past the end is allowed;
    /// the next read fails.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    #[inline]
    pub fn skip(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    #[inline]
    pub fn eof(&self) -> bool {
        self.position >= self.len
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.position)
    }

    /// The whole window, independent of the read position.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.base..self.base + self.len]
    }

    fn take(&mut self, count: usize) -> Result<&[u8], CursorError> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.len)
            .ok_or(CursorError::OutOfBounds {
                position: self.position,
                requested: count,
                length: self.len,
            })?;
        let start = self.base + self.position;
        self.position = end;
        Ok(&self.data[start..self.base + end])
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CursorError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16, CursorError> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CursorError> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    /// 16.16 fixed-point value.
    pub fn read_fixed(&mut self) -> Result<f64, CursorError> {
        Ok(self.read_i32()? as f64 / 65536.0)
    }

    /// Copy the next `count` bytes out of the buffer.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, CursorError> {
        Ok(self.take(count)?.to_vec())
    }

    /// The next `count` bytes as a slice of the shared buffer, without copying.
    pub fn read_shared(&mut self, count: usize) -> Result<Bytes, CursorError> {
        let start = self.base + self.position;
        self.take(count)?;
        Ok(self.data.slice(start..start + count))
    }

    /// Reads exactly `len` bytes and keeps the text before the first NUL.
    pub fn read_string(&mut self, len: usize) -> Result<String, CursorError> {
        let raw = self.take(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}
