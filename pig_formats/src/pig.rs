//! PIG archive directory parsing.

use bytes::Bytes;
use log::debug;
use serde::Serialize;

use crate::bitmap::{BitmapStore, GameBitmap};
use crate::cursor::ByteCursor;
use crate::error::{FormatError, TruncatedContext};
use crate::sound::{GameSound, SoundStore};

/// Bitmap slots, including the reserved placeholder at index 0.
pub const MAX_BITMAPS: usize = 1800;
pub const MAX_SOUNDS: usize = 250;

pub const DISK_BITMAP_HEADER_SIZE: usize = 17;
pub const DISK_SOUND_HEADER_SIZE: usize = 20;
pub const XLAT_TABLE_SIZE: usize = MAX_BITMAPS * 2;
/// The two directory counts that precede the header records.
pub const DIRECTORY_COUNTS_SIZE: usize = 8;
pub const NAME_SIZE: usize = 8;

/// Directory flag: frame of an animated bitmap, frame number in the low bits.
pub const DBM_FLAG_ANIMATED: u8 = 0x40;
/// Directory flag: add 256 to the stored width.
pub const DBM_FLAG_LARGE: u8 = 0x80;
pub const DBM_FRAME_MASK: u8 = 0x3F;

pub const SHAREWARE_PIG_SIZES: [usize; 3] = [2_509_799, 2_529_454, 5_092_871];
pub const REGISTERED_10_PIG_SIZES: [usize; 2] = [4_520_145, 7_640_220];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PigVariant {
    Shareware,
    Registered10,
    /// Any size not listed above; the directory location is read from the file.
    Registered,
}

impl PigVariant {
    pub fn classify(file_size: usize) -> Self {
        if SHAREWARE_PIG_SIZES.contains(&file_size) {
            PigVariant::Shareware
        } else if REGISTERED_10_PIG_SIZES.contains(&file_size) {
            PigVariant::Registered10
        } else {
            PigVariant::Registered
        }
    }
}

/// Where the directory and payloads sit inside the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PigLayout {
    pub variant: PigVariant,
    pub directory_data_start: usize,
    pub bitmap_count: usize,
    pub sound_count: usize,
    pub header_size: usize,
}

impl PigLayout {
    /// Base that relative payload offsets are added to.
    pub fn payload_base(&self) -> usize {
        self.directory_data_start + DIRECTORY_COUNTS_SIZE + self.header_size
    }
}

/// Parsed PIG archive. Payloads stay in the shared buffer until paged in.
#[derive(Debug)]
pub struct PigArchive {
    layout: PigLayout,
    source: ByteCursor,
    auxiliary: Option<(usize, usize)>,
    translation: Option<Box<[u16]>>,
    bitmaps: BitmapStore,
    sounds: SoundStore,
}

impl PigArchive {
    /// Parse the directories of a whole in-memory PIG file.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self, FormatError> {
        let source = ByteCursor::new(data);
        let variant = PigVariant::classify(source.len());
        debug!("classified {} byte PIG as {variant:?}", source.len());

        let mut cursor = source.clone();
        let mut auxiliary = None;
        let mut translation = None;
        let directory_data_start = match variant {
            PigVariant::Shareware | PigVariant::Registered10 => 0,
            PigVariant::Registered => {
                let start = cursor.read_i32().truncated("directory start")?;
                let start = usize::try_from(start).map_err(|_| {
                    FormatError::InvalidDirectory(format!("negative directory start {start}"))
                })?;
                let aux_start = cursor.tell();
                match start.checked_sub(XLAT_TABLE_SIZE) {
                    Some(xlat_start) if xlat_start >= aux_start && start <= source.len() => {
                        auxiliary = Some((aux_start, xlat_start - aux_start));
                        cursor.seek(xlat_start);
                        translation = Some(read_translation_table(&mut cursor)?);
                    }
                    _ => debug!("no translation table in front of directory at {start}"),
                }
                start
            }
        };

        cursor.seek(directory_data_start);
        let bitmap_count = read_count(&mut cursor, "bitmap", MAX_BITMAPS - 1)?;
        let sound_count = read_count(&mut cursor, "sound", MAX_SOUNDS)?;
        let layout = PigLayout {
            variant,
            directory_data_start,
            bitmap_count,
            sound_count,
            header_size: bitmap_count * DISK_BITMAP_HEADER_SIZE
                + sound_count * DISK_SOUND_HEADER_SIZE,
        };

        if layout.payload_base() > source.len() {
            return Err(FormatError::InvalidDirectory(format!(
                "{bitmap_count} bitmap and {sound_count} sound headers need {} bytes past {}, file has {}",
                layout.header_size,
                directory_data_start + DIRECTORY_COUNTS_SIZE,
                source.len()
            )));
        }

        let mut bitmaps = Vec::with_capacity(bitmap_count + 1);
        bitmaps.push(GameBitmap::placeholder());
        for index in 0..bitmap_count {
            let bitmap = read_bitmap_header(&mut cursor, &layout)
                .map_err(|err| with_entry_context(err, "bitmap", index))?;
            bitmaps.push(bitmap);
        }

        let mut sounds = Vec::with_capacity(sound_count);
        for index in 0..sound_count {
            let sound = read_sound_header(&mut cursor, &layout)
                .map_err(|err| with_entry_context(err, "sound", index))?;
            sounds.push(sound);
        }

        debug!(
            "PIG directory at {}: {} bitmaps, {} sounds, payloads from {}",
            layout.directory_data_start,
            bitmap_count,
            sound_count,
            layout.payload_base()
        );

        Ok(PigArchive {
            layout,
            auxiliary,
            translation,
            bitmaps: BitmapStore::new(source.clone(), bitmaps),
            sounds: SoundStore::new(source.clone(), sounds),
            source,
        })
    }

    pub fn layout(&self) -> &PigLayout {
        &self.layout
    }

    pub fn variant(&self) -> PigVariant {
        self.layout.variant
    }

    pub fn bitmaps(&self) -> &BitmapStore {
        &self.bitmaps
    }

    pub fn sounds(&self) -> &SoundStore {
        &self.sounds
    }

    /// Cursor over the whole archive.
    pub fn source(&self) -> &ByteCursor {
        &self.source
    }

    /// Opaque texture metadata stored in front of the translation table
    /// (newer layout only).
    pub fn auxiliary_data(&self) -> Option<ByteCursor> {
        let (offset, len) = self.auxiliary?;
        self.source.sub_cursor(offset, len).ok()
    }

    pub fn has_translation_table(&self) -> bool {
        self.translation.is_some()
    }

    /// Storage index for a nominal bitmap index. Identity without a table or
    /// beyond its end.
    pub fn translate_bitmap_index(&self, nominal: usize) -> usize {
        self.translation
            .as_ref()
            .and_then(|table| table.get(nominal))
            .map_or(nominal, |&index| index as usize)
    }

    /// Live flags of a bitmap; see [`GameBitmap::flags`].
    pub fn bitmap_flags(&self, index: usize) -> Option<u8> {
        self.bitmaps.flags(index)
    }

    pub fn page_in(&self, index: usize) {
        self.bitmaps.page_in(index);
    }

    pub fn page_in_all(&self) {
        self.bitmaps.page_in_all();
    }

    pub fn bitmap_pixels(&self, index: usize) -> &[u8] {
        self.bitmaps.bitmap_pixels(index)
    }

    pub fn sound_pcm(&self, index: usize) -> &[u8] {
        self.sounds.sound_pcm(index)
    }

    pub fn decode_all_sounds(&self) -> usize {
        self.sounds.decode_all()
    }

    pub fn find_bitmap_index_by_name(&self, name: &str) -> Option<usize> {
        self.bitmaps.find_index_by_name(name)
    }

    pub fn find_sound_index_by_name(&self, name: &str) -> Option<usize> {
        self.sounds.find_index_by_name(name)
    }
}

fn read_translation_table(cursor: &mut ByteCursor) -> Result<Box<[u16]>, FormatError> {
    let mut table = Vec::with_capacity(MAX_BITMAPS);
    for _ in 0..MAX_BITMAPS {
        table.push(cursor.read_u16().truncated("bitmap translation table")?);
    }
    Ok(table.into_boxed_slice())
}

fn read_count(cursor: &mut ByteCursor, kind: &str, max: usize) -> Result<usize, FormatError> {
    let count = cursor.read_i32().truncated(&format!("{kind} count"))?;
    match usize::try_from(count) {
        Ok(count) if count <= max => Ok(count),
        _ => Err(FormatError::InvalidDirectory(format!(
            "{kind} count {count} outside 0..={max}"
        ))),
    }
}

fn read_bitmap_header(
    cursor: &mut ByteCursor,
    layout: &PigLayout,
) -> Result<GameBitmap, FormatError> {
    let name = cursor.read_string(NAME_SIZE)?;
    let dflags = cursor.read_u8()?;
    let width = cursor.read_u8()?;
    let height = cursor.read_u8()?;
    let flags = cursor.read_u8()?;
    let average_color = cursor.read_u8()?;
    let offset = cursor.read_u32()? as usize;

    let name = if dflags & DBM_FLAG_ANIMATED != 0 {
        format!("{name}#{}", dflags & DBM_FRAME_MASK)
    } else {
        name
    };
    let width = width as u16 + if dflags & DBM_FLAG_LARGE != 0 { 256 } else { 0 };

    Ok(GameBitmap::new(
        name,
        width,
        height as u16,
        flags,
        average_color,
        offset + layout.payload_base(),
    ))
}

fn read_sound_header(cursor: &mut ByteCursor, layout: &PigLayout) -> Result<GameSound, FormatError> {
    let name = cursor.read_string(NAME_SIZE)?;
    let length = cursor.read_u32()? as usize;
    let data_length = cursor.read_u32()? as usize;
    let offset = cursor.read_u32()? as usize;
    Ok(GameSound::new(
        name,
        length,
        data_length,
        offset + layout.payload_base(),
    ))
}

fn with_entry_context(err: FormatError, kind: &str, index: usize) -> FormatError {
    match err {
        FormatError::Truncated { source, .. } => {
            FormatError::truncated(format!("{kind} header {index}"), source)
        }
        other => other,
    }
}
