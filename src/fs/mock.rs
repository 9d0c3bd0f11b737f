// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

/// In-memory filesystem for tests.
///
/// Clones share the same backing map, so a fake command backend can
/// "clone a repository" by adding a directory that the sync coordinator
/// then sees.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.add_dir(".");
        fs
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalise(path.as_ref());
        let mut entries = self.lock();
        if let Some(parent) = path.parent() {
            insert_dirs(&mut entries, parent);
        }
        entries.insert(path, MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = normalise(path.as_ref());
        insert_dirs(&mut self.lock(), &path);
    }

    /// Contents of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().get(&normalise(path.as_ref())) {
            Some(MockEntry::File(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        // A poisoned map only happens after a panicking test; keep going.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Strip `.` components so `./a/b` and `a/b` name the same entry.
fn normalise(path: &Path) -> PathBuf {
    let cleaned: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

fn insert_dirs(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        entries
            .entry(normalise(&current))
            .or_insert(MockEntry::Dir);
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.lock().get(&normalise(path)) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(&normalise(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(&normalise(path)), Some(MockEntry::Dir))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }
}
