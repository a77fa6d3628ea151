use log::debug;

use crate::cursor::ByteCursor;
use crate::error::{FormatError, TruncatedContext};
use crate::resource::ResourceSource;

pub const PALETTE_ENTRIES: usize = 256;
pub const PALETTE_SIZE: usize = PALETTE_ENTRIES * 3;

/// Resource names tried, in order, by [`load_palette`].
pub const PALETTE_CANDIDATES: [&str; 2] = ["palette.256", "groupa.256"];

/// 256 RGB triples with 8 bits per channel.
#[derive(Clone, PartialEq, Eq)]
pub struct Palette([u8; PALETTE_SIZE]);

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette")
            .field("first", &self.rgb(0))
            .field("last", &self.rgb(255))
            .finish()
    }
}

impl Palette {
    /// Convert the leading 768 bytes of a VGA DAC palette (0..=63 per
    /// channel). Trailing data such as fade tables is ignored.
    pub fn from_vga(cursor: &mut ByteCursor) -> Result<Self, FormatError> {
        let raw = cursor.read_bytes(PALETTE_SIZE).truncated("palette")?;
        let mut rgb = [0u8; PALETTE_SIZE];
        for (out, value) in rgb.iter_mut().zip(raw) {
            *out = dac_to_rgb8(value);
        }
        Ok(Palette(rgb))
    }

    pub fn as_bytes(&self) -> &[u8; PALETTE_SIZE] {
        &self.0
    }

    pub fn rgb(&self, index: u8) -> [u8; 3] {
        let start = index as usize * 3;
        [self.0[start], self.0[start + 1], self.0[start + 2]]
    }
}

/// Widen a 6-bit DAC value, replicating its top two bits into the bottom two.
#[inline]
pub fn dac_to_rgb8(value: u8) -> u8 {
    let value = value & 0x3F;
    (value << 2) | (value >> 4)
}

/// Load the first palette found among [`PALETTE_CANDIDATES`].
pub fn load_palette(resources: &impl ResourceSource) -> Result<Palette, FormatError> {
    load_palette_from(resources, &PALETTE_CANDIDATES)
}

pub fn load_palette_from(
    resources: &impl ResourceSource,
    names: &[&str],
) -> Result<Palette, FormatError> {
    for name in names {
        if let Some(mut cursor) = resources.open(name) {
            debug!("loading palette from {name}");
            return Palette::from_vga(&mut cursor);
        }
    }
    Err(FormatError::PaletteUnavailable {
        tried: names.iter().map(|name| name.to_string()).collect(),
    })
}
