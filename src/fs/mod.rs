// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
///
/// Everything the orchestrator inspects or persists on its own (config,
/// repository presence, snapshots, status exports) goes through this trait.
/// Child processes of course see the real filesystem.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace the file at `path` with `contents`, creating parent
    /// directories as needed. Readers never observe a half-written file.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = Path::new(&tmp_name);

        let mut file = fs::File::create(tmp).with_context(|| format!("creating file {:?}", tmp))?;
        file.write_all(contents)
            .with_context(|| format!("writing to file {:?}", tmp))?;
        file.sync_all().with_context(|| format!("syncing file {:?}", tmp))?;
        fs::rename(tmp, path).with_context(|| format!("renaming {:?} to {:?}", tmp, path))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parents_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/results.json");

        RealFileSystem.write(&target, b"{}").unwrap();

        assert_eq!(RealFileSystem.read_to_string(&target).unwrap(), "{}");
        assert!(!dir.path().join("nested/out/results.json.tmp").exists());
    }

    #[test]
    fn write_replaces_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("status.json");

        RealFileSystem.write(&target, b"first").unwrap();
        RealFileSystem.write(&target, b"second").unwrap();

        assert_eq!(RealFileSystem.read_to_string(&target).unwrap(), "second");
    }
}
