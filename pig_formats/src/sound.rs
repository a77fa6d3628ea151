use std::collections::HashMap;

use bytes::Bytes;
use log::{trace, warn};
use once_cell::sync::OnceCell;

use crate::adpcm::decode_adpcm;
use crate::cursor::ByteCursor;
use crate::error::{FormatError, TruncatedContext};

/// One sound directory entry. `length` counts decoded 8-bit samples,
/// `data_length` counts bytes stored in the archive.
#[derive(Debug)]
pub struct GameSound {
    pub name: String,
    pub length: usize,
    pub data_length: usize,
    offset: usize,
    pcm: OnceCell<Result<Bytes, FormatError>>,
}

impl GameSound {
    pub(crate) fn new(name: String, length: usize, data_length: usize, offset: usize) -> Self {
        GameSound {
            name,
            length,
            data_length,
            offset,
            pcm: OnceCell::new(),
        }
    }

    /// Stored bytes shorter than the sample count means ADPCM.
    pub fn is_compressed(&self) -> bool {
        self.data_length < self.length
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self.pcm.get(), Some(Ok(_)))
    }
}

#[derive(Debug)]
pub struct SoundStore {
    source: ByteCursor,
    sounds: Vec<GameSound>,
    by_name: HashMap<String, usize>,
}

impl SoundStore {
    pub(crate) fn new(source: ByteCursor, sounds: Vec<GameSound>) -> Self {
        let mut by_name = HashMap::with_capacity(sounds.len());
        for (index, sound) in sounds.iter().enumerate() {
            by_name.entry(sound.name.to_ascii_lowercase()).or_insert(index);
        }
        SoundStore {
            source,
            sounds,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GameSound> {
        self.sounds.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameSound> {
        self.sounds.iter()
    }

    pub fn find_index_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    /// Unsigned 8-bit PCM for a sound, decoded once and cached.
    pub fn try_sound_pcm(&self, index: usize) -> Result<&[u8], FormatError> {
        let sound = self.sounds.get(index).ok_or(FormatError::UnknownAsset {
            kind: "sound",
            index,
        })?;
        sound
            .pcm
            .get_or_init(|| {
                let decoded = self.load_pcm(sound);
                match &decoded {
                    Ok(pcm) => trace!(
                        "loaded sound {index} '{}' ({} samples)",
                        sound.name,
                        pcm.len()
                    ),
                    Err(err) => warn!("failed to load sound {index} '{}': {err}", sound.name),
                }
                decoded
            })
            .as_deref()
            .map_err(Clone::clone)
    }

    /// PCM for a sound, or silence (no samples) when it cannot be loaded.
    pub fn sound_pcm(&self, index: usize) -> &[u8] {
        self.try_sound_pcm(index).unwrap_or_default()
    }

    /// Decode every sound, returning how many succeeded.
    pub fn decode_all(&self) -> usize {
        (0..self.sounds.len())
            .filter(|&index| self.try_sound_pcm(index).is_ok())
            .count()
    }

    fn load_pcm(&self, sound: &GameSound) -> Result<Bytes, FormatError> {
        let mut view = self
            .source
            .sub_cursor(sound.offset, sound.data_length)
            .truncated("sound data")?;
        let stored = view.read_shared(sound.data_length).truncated("sound data")?;

        if !sound.is_compressed() {
            return Ok(stored);
        }
        if sound.length > sound.data_length.saturating_mul(2) {
            return Err(FormatError::UnsupportedLayout(format!(
                "sound '{}' stores {} bytes for {} ADPCM samples",
                sound.name, sound.data_length, sound.length
            )));
        }
        decode_adpcm(&stored, sound.length).map(Bytes::from)
    }
}
