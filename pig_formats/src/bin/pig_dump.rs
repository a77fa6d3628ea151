use std::env;

use anyhow::{Context, Result};
use pig_formats::{PigArchive, map_file};

fn main() -> Result<()> {
    env_logger::init();
    let path = env::args().nth(1).context("usage: pig_dump <PIG file>")?;
    let archive = PigArchive::from_bytes(map_file(&path)?)
        .with_context(|| format!("parsing PIG archive {path}"))?;

    let layout = archive.layout();
    println!(
        "{path}: {:?}, directory at {}, {} bitmaps, {} sounds",
        layout.variant, layout.directory_data_start, layout.bitmap_count, layout.sound_count
    );

    for (index, bitmap) in archive.bitmaps().iter().enumerate().skip(1) {
        println!(
            "bm  {index:>5} {name:<12} {width:>4}x{height:<4} flags {flags:#04x} avg {avg:>3} @ {offset:>10}",
            name = bitmap.name,
            width = bitmap.width,
            height = bitmap.height,
            flags = bitmap.disk_flags(),
            avg = bitmap.average_color,
            offset = bitmap.offset()
        );
    }
    for (index, sound) in archive.sounds().iter().enumerate() {
        println!(
            "snd {index:>5} {name:<12} {length:>8} samples {stored:>8} bytes{adpcm} @ {offset:>10}",
            name = sound.name,
            length = sound.length,
            stored = sound.data_length,
            adpcm = if sound.is_compressed() { " adpcm" } else { "" },
            offset = sound.offset()
        );
    }
    Ok(())
}
