pub mod adpcm;
pub mod bitmap;
pub mod cursor;
pub mod error;
pub mod mapped;
pub mod palette;
pub mod pig;
pub mod resource;
pub mod rle;
pub mod sound;

pub use adpcm::{AdpcmState, decode_adpcm};
pub use bitmap::{BitmapStore, GameBitmap};
pub use cursor::ByteCursor;
pub use error::{CursorError, FormatError};
pub use mapped::map_file;
pub use palette::{PALETTE_CANDIDATES, Palette, load_palette, load_palette_from};
pub use pig::{PigArchive, PigLayout, PigVariant};
pub use resource::{DirectoryResources, MemoryResources, ResourceSource};
pub use rle::decode_rle;
pub use sound::{GameSound, SoundStore};
