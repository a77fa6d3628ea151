use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::warn;
use pig_formats::{DirectoryResources, PigArchive, PigLayout, load_palette, map_file};
use serde::Serialize;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(about = "Extract bitmaps and sounds from PIG archives", version)]
struct Args {
    /// PIG archive to extract (may be passed multiple times)
    #[arg(long = "pig", value_name = "PATH", conflicts_with = "root")]
    pigs: Vec<PathBuf>,

    /// Directory containing PIG archives (recursively scanned when --pig is not used)
    #[arg(long = "root", value_name = "DIR", conflicts_with = "pigs")]
    root: Option<PathBuf>,

    /// Destination directory to materialise assets
    #[arg(long, value_name = "DIR", default_value = "extracted")]
    dest: PathBuf,

    /// Optional newline-delimited list of asset names to extract (case-insensitive)
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Individual asset names to extract (case-insensitive, may repeat)
    #[arg(long = "asset", value_name = "NAME")]
    assets: Vec<String>,

    /// Write stored payloads instead of decoded pixels/PCM
    #[arg(long)]
    raw: bool,

    /// Directory holding a palette resource to convert alongside the assets
    #[arg(long, value_name = "DIR")]
    palette_dir: Option<PathBuf>,

    /// Overwrite existing files instead of skipping them
    #[arg(long)]
    overwrite: bool,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    source: String,
    layout: &'a PigLayout,
    bitmaps: Vec<BitmapRecord<'a>>,
    sounds: Vec<SoundRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct BitmapRecord<'a> {
    index: usize,
    name: &'a str,
    width: u16,
    height: u16,
    flags: u8,
    average_color: u8,
    offset: usize,
    file: Option<String>,
}

#[derive(Debug, Serialize)]
struct SoundRecord<'a> {
    index: usize,
    name: &'a str,
    samples: usize,
    stored_bytes: usize,
    compressed: bool,
    offset: usize,
    file: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let pigs = resolve_pig_paths(&args);
    if pigs.is_empty() {
        bail!("no PIG archives to extract");
    }

    let filter = build_asset_filter(&args)?;

    fs::create_dir_all(&args.dest)
        .with_context(|| format!("creating destination {}", args.dest.display()))?;

    if let Some(dir) = args.palette_dir.as_ref() {
        let resources = DirectoryResources::scan(dir);
        let palette = load_palette(&resources)
            .with_context(|| format!("loading palette from {}", dir.display()))?;
        let dest = args.dest.join("palette.rgb");
        fs::write(&dest, palette.as_bytes())
            .with_context(|| format!("writing {}", dest.display()))?;
    }

    for pig_path in pigs {
        let archive = PigArchive::from_bytes(map_file(&pig_path)?)
            .with_context(|| format!("parsing PIG archive {}", pig_path.display()))?;
        extract_archive(&pig_path, &archive, &args, filter.as_ref())?;
    }

    Ok(())
}

fn resolve_pig_paths(args: &Args) -> Vec<PathBuf> {
    let mut pigs = Vec::new();

    if !args.pigs.is_empty() {
        pigs.extend(args.pigs.iter().cloned());
    } else if let Some(root) = args.root.as_ref() {
        for entry in WalkDir::new(root).into_iter().filter_map(|res| res.ok()) {
            let is_pig = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pig"));
            if entry.file_type().is_file() && is_pig {
                pigs.push(entry.into_path());
            }
        }
    }

    pigs.sort();
    pigs.dedup();
    pigs
}

fn build_asset_filter(args: &Args) -> Result<Option<HashSet<String>>> {
    let mut entries: HashSet<String> = HashSet::new();

    if let Some(manifest_path) = args.manifest.as_ref() {
        let file = File::open(manifest_path)
            .with_context(|| format!("opening manifest {}", manifest_path.display()))?;
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            entries.insert(trimmed.to_ascii_lowercase());
        }
    }

    for asset in &args.assets {
        entries.insert(asset.trim().to_ascii_lowercase());
    }

    Ok(if entries.is_empty() { None } else { Some(entries) })
}

fn wanted(filter: Option<&HashSet<String>>, name: &str) -> bool {
    filter.is_none_or(|filter| filter.contains(&name.to_ascii_lowercase()))
}

/// `door#3` becomes `door_3` so frame names stay portable.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn write_asset(path: &Path, bytes: &[u8], overwrite: bool) -> Result<bool> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(true)
}

fn extract_archive(
    pig_path: &Path,
    archive: &PigArchive,
    args: &Args,
    filter: Option<&HashSet<String>>,
) -> Result<()> {
    let pig_name = pig_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("pig")
        .to_ascii_uppercase();
    let pig_dest = args.dest.join(&pig_name);
    fs::create_dir_all(&pig_dest).with_context(|| format!("creating {}", pig_dest.display()))?;

    let mut bitmaps = Vec::new();
    let mut extracted = 0usize;
    for (index, bitmap) in archive.bitmaps().iter().enumerate().skip(1) {
        let mut file = None;
        if wanted(filter, &bitmap.name) {
            let (loaded, ext) = if args.raw {
                (archive.bitmaps().try_page_in(index).map(|raw| &raw[..]), "bbm")
            } else {
                (archive.bitmaps().try_bitmap_pixels(index), "idx")
            };
            match loaded {
                Ok(bytes) => {
                    let name = format!("{index:04}_{}.{ext}", file_stem(&bitmap.name));
                    if write_asset(&pig_dest.join(&name), bytes, args.overwrite)? {
                        extracted += 1;
                    }
                    file = Some(name);
                }
                Err(err) => warn!("skipping bitmap {}: {err}", bitmap.name),
            }
        }
        bitmaps.push(BitmapRecord {
            index,
            name: &bitmap.name,
            width: bitmap.width,
            height: bitmap.height,
            flags: bitmap.disk_flags(),
            average_color: bitmap.average_color,
            offset: bitmap.offset(),
            file,
        });
    }

    let mut sounds = Vec::new();
    for (index, sound) in archive.sounds().iter().enumerate() {
        let mut file = None;
        if wanted(filter, &sound.name) {
            match archive.sounds().try_sound_pcm(index) {
                Ok(pcm) => {
                    let name = format!("{index:03}_{}.pcm", file_stem(&sound.name));
                    if write_asset(&pig_dest.join(&name), pcm, args.overwrite)? {
                        extracted += 1;
                    }
                    file = Some(name);
                }
                Err(err) => warn!("skipping sound {}: {err}", sound.name),
            }
        }
        sounds.push(SoundRecord {
            index,
            name: &sound.name,
            samples: sound.length,
            stored_bytes: sound.data_length,
            compressed: sound.is_compressed(),
            offset: sound.offset(),
            file,
        });
    }

    let manifest = Manifest {
        source: pig_path.display().to_string(),
        layout: archive.layout(),
        bitmaps,
        sounds,
    };
    let manifest_path = pig_dest.join("directory.json");
    let mut writer = BufWriter::new(
        File::create(&manifest_path)
            .with_context(|| format!("creating {}", manifest_path.display()))?,
    );
    serde_json::to_writer_pretty(&mut writer, &manifest)?;
    writer.flush()?;

    println!(
        "Extracted {} assets from {} into {}",
        extracted,
        pig_path.display(),
        pig_dest.display()
    );

    Ok(())
}
