use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use memmap2::MmapOptions;

/// Memory-map a file and hand it out as a shared buffer for
/// [`PigArchive::from_bytes`](crate::PigArchive::from_bytes) or
/// [`ByteCursor::new`](crate::ByteCursor::new).
pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Bytes> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mmap = unsafe { MmapOptions::new().map(&file) }
        .with_context(|| format!("memory-mapping {}", path.display()))?;
    Ok(Bytes::from_owner(mmap))
}
