// src/progress/snapshot.rs

//! Durable JSON snapshot of the progress tree.
//!
//! Written after every stage transition and once more when the run ends,
//! whatever way it ends, so the last attempted command is always on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;

use super::tree::ProgressTree;

#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, tree: &ProgressTree) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(tree)?;
        self.fs.write(&self.path, &bytes)?;
        debug!(path = %self.path.display(), stages = tree.stages.len(), "progress snapshot written");
        Ok(())
    }

    /// Read a snapshot back.
    pub fn load(&self) -> Result<ProgressTree> {
        let contents = self.fs.read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
