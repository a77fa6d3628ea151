use std::collections::HashMap;

use bytes::Bytes;
use log::{trace, warn};
use once_cell::sync::OnceCell;

use crate::cursor::ByteCursor;
use crate::error::{FormatError, TruncatedContext};
use crate::rle::decode_rle;

pub const BM_FLAG_TRANSPARENT: u8 = 0x01;
pub const BM_FLAG_SUPER_TRANSPARENT: u8 = 0x02;
pub const BM_FLAG_NO_LIGHTING: u8 = 0x04;
pub const BM_FLAG_RLE: u8 = 0x08;
/// Live flag value of a bitmap whose bytes have not been paged in yet.
pub const BM_FLAG_PAGED_OUT: u8 = 0x10;
/// On-disk flag bits that survive parsing.
pub const BM_FLAG_MASK: u8 =
    BM_FLAG_TRANSPARENT | BM_FLAG_SUPER_TRANSPARENT | BM_FLAG_NO_LIGHTING | BM_FLAG_RLE;

pub const PLACEHOLDER_SIZE: u16 = 64;
pub const PLACEHOLDER_NAME: &str = "bogus";

type Slot = OnceCell<Result<Bytes, FormatError>>;

/// One bitmap directory entry plus its lazily filled payload caches.
#[derive(Debug)]
pub struct GameBitmap {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub average_color: u8,
    disk_flags: u8,
    offset: usize,
    raw: Slot,
    pixels: Slot,
}

impl GameBitmap {
    pub(crate) fn new(
        name: String,
        width: u16,
        height: u16,
        disk_flags: u8,
        average_color: u8,
        offset: usize,
    ) -> Self {
        GameBitmap {
            name,
            width,
            height,
            average_color,
            disk_flags: disk_flags & BM_FLAG_MASK,
            offset,
            raw: OnceCell::new(),
            pixels: OnceCell::new(),
        }
    }

    /// The reserved index-0 entry: 64x64, all zero, never read from disk.
    pub(crate) fn placeholder() -> Self {
        let side = PLACEHOLDER_SIZE as usize;
        let zeros = Bytes::from(vec![0u8; side * side]);
        GameBitmap {
            name: PLACEHOLDER_NAME.to_string(),
            width: PLACEHOLDER_SIZE,
            height: PLACEHOLDER_SIZE,
            average_color: 0,
            disk_flags: 0,
            offset: 0,
            raw: OnceCell::with_value(Ok(zeros.clone())),
            pixels: OnceCell::with_value(Ok(zeros)),
        }
    }

    /// Live flags: [`BM_FLAG_PAGED_OUT`] until the payload is resident.
    pub fn flags(&self) -> u8 {
        match self.raw.get() {
            Some(Ok(_)) => self.disk_flags,
            _ => BM_FLAG_PAGED_OUT,
        }
    }

    /// The masked flags recorded in the directory.
    pub fn disk_flags(&self) -> u8 {
        self.disk_flags
    }

    pub fn is_rle(&self) -> bool {
        self.disk_flags & BM_FLAG_RLE != 0
    }

    pub fn is_paged_in(&self) -> bool {
        matches!(self.raw.get(), Some(Ok(_)))
    }

    /// Absolute offset of the payload within the archive (0 for the placeholder).
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Paged-in payload exactly as stored: the size-prefixed RLE stream for
    /// compressed bitmaps, plain indices otherwise.
    pub fn raw_data(&self) -> Option<&[u8]> {
        match self.raw.get() {
            Some(Ok(bytes)) => Some(bytes),
            _ => None,
        }
    }
}

/// Bitmap directory with page-in and decode caches over the archive buffer.
#[derive(Debug)]
pub struct BitmapStore {
    source: ByteCursor,
    bitmaps: Vec<GameBitmap>,
    by_name: HashMap<String, usize>,
}

impl BitmapStore {
    pub(crate) fn new(source: ByteCursor, bitmaps: Vec<GameBitmap>) -> Self {
        let mut by_name = HashMap::with_capacity(bitmaps.len());
        for (index, bitmap) in bitmaps.iter().enumerate().skip(1) {
            by_name
                .entry(bitmap.name.to_ascii_lowercase())
                .or_insert(index);
        }
        BitmapStore {
            source,
            bitmaps,
            by_name,
        }
    }

    /// Number of entries, including the placeholder.
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GameBitmap> {
        self.bitmaps.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameBitmap> {
        self.bitmaps.iter()
    }

    pub fn placeholder(&self) -> &GameBitmap {
        &self.bitmaps[0]
    }

    pub fn flags(&self, index: usize) -> Option<u8> {
        self.get(index).map(GameBitmap::flags)
    }

    /// Case-insensitive; animated frames are named `name#frame`.
    pub fn find_index_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    /// Materialise a bitmap's stored bytes. Out-of-range indices, the
    /// placeholder and already resident bitmaps are left alone; failures are
    /// logged and remembered for the asset.
    pub fn page_in(&self, index: usize) {
        let _ = self.try_page_in(index);
    }

    pub fn page_in_all(&self) {
        for index in 1..self.bitmaps.len() {
            self.page_in(index);
        }
    }

    pub fn try_page_in(&self, index: usize) -> Result<&Bytes, FormatError> {
        let bitmap = self.bitmaps.get(index).ok_or(FormatError::UnknownAsset {
            kind: "bitmap",
            index,
        })?;
        bitmap
            .raw
            .get_or_init(|| {
                let loaded = self.load_raw(bitmap);
                match &loaded {
                    Ok(bytes) => trace!(
                        "paged in bitmap {index} '{}' ({} bytes)",
                        bitmap.name,
                        bytes.len()
                    ),
                    Err(err) => warn!("failed to page in bitmap {index} '{}': {err}", bitmap.name),
                }
                loaded
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    fn load_raw(&self, bitmap: &GameBitmap) -> Result<Bytes, FormatError> {
        let len = if bitmap.is_rle() {
            let mut cursor = self
                .source
                .sub_cursor(bitmap.offset, 4)
                .truncated("RLE bitmap size")?;
            cursor.read_u32().truncated("RLE bitmap size")? as usize
        } else {
            bitmap.pixel_count()
        };
        let mut view = self
            .source
            .sub_cursor(bitmap.offset, len)
            .truncated("bitmap payload")?;
        view.read_shared(len).truncated("bitmap payload")
    }

    /// Decoded palette indices (`width * height` bytes), paging in first.
    /// RLE payloads are decoded once and cached.
    pub fn try_bitmap_pixels(&self, index: usize) -> Result<&[u8], FormatError> {
        let raw = self.try_page_in(index)?;
        let bitmap = &self.bitmaps[index];
        bitmap
            .pixels
            .get_or_init(|| {
                if !bitmap.is_rle() {
                    return Ok(raw.clone());
                }
                let decoded = decode_rle(raw, bitmap.width as usize, bitmap.height as usize)
                    .map(Bytes::from);
                if let Err(err) = &decoded {
                    warn!("failed to decode bitmap {index} '{}': {err}", bitmap.name);
                }
                decoded
            })
            .as_deref()
            .map_err(Clone::clone)
    }

    /// Like [`try_bitmap_pixels`](Self::try_bitmap_pixels), substituting the
    /// placeholder's pixels for missing or broken bitmaps.
    pub fn bitmap_pixels(&self, index: usize) -> &[u8] {
        match self.try_bitmap_pixels(index) {
            Ok(pixels) => pixels,
            Err(_) => self
                .placeholder()
                .pixels
                .get()
                .and_then(|slot| slot.as_deref().ok())
                .unwrap_or_default(),
        }
    }
}
