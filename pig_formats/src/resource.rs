use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use log::{debug, warn};
use walkdir::WalkDir;

use crate::cursor::ByteCursor;

/// Anything that can turn a resource filename into a reader over its bytes.
///
/// Archive containers (HOG files, loose directories) sit behind this trait;
/// names are matched case-insensitively by the provided implementations.
pub trait ResourceSource {
    fn open(&self, name: &str) -> Option<ByteCursor>;
}

/// Resources held in memory, keyed by lower-cased name.
#[derive(Debug, Default, Clone)]
pub struct MemoryResources {
    entries: HashMap<String, Bytes>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, data: impl Into<Bytes>) {
        self.entries.insert(name.to_ascii_lowercase(), data.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceSource for MemoryResources {
    fn open(&self, name: &str) -> Option<ByteCursor> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|data| ByteCursor::new(data.clone()))
    }
}

/// Loose files below a directory. The tree is scanned once; files are read
/// when opened. When two files share a name the one with the shortest path
/// wins.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
    files: HashMap<String, PathBuf>,
}

impl DirectoryResources {
    pub fn scan<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let mut paths: Vec<PathBuf> = WalkDir::new(&root)
            .into_iter()
            .filter_map(|res| res.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        paths.sort_by_key(|path| (path.components().count(), path.clone()));

        let mut files = HashMap::new();
        for path in paths {
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                files.entry(name.to_ascii_lowercase()).or_insert(path);
            }
        }
        debug!("indexed {} resources under {}", files.len(), root.display());

        DirectoryResources { root, files }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> Option<&Path> {
        self.files
            .get(&name.to_ascii_lowercase())
            .map(PathBuf::as_path)
    }
}

impl ResourceSource for DirectoryResources {
    fn open(&self, name: &str) -> Option<ByteCursor> {
        let path = self.path_of(name)?;
        match fs::read(path) {
            Ok(data) => Some(ByteCursor::new(data)),
            Err(err) => {
                warn!("failed to read resource {}: {err}", path.display());
                None
            }
        }
    }
}
