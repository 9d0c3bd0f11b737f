// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

/// Load a pipeline file from a given path and return the raw `RawPipelineFile`.
///
/// This only performs TOML deserialization; it does **not** resolve
/// repository defaults or check invariants. Use [`load_and_validate`] for that.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawPipelineFile> {
    let contents = fs.read_to_string(path.as_ref())?;
    let config: RawPipelineFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a pipeline file from disk and validate it.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Resolves each `[[repository]]` into a `RepoSpec` (URL from template).
/// - Rejects duplicate / escaping repository paths, zero parallelism,
///   empty steps and similar mistakes.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineFile> {
    load_and_validate_with(&RealFileSystem, path)
}

/// [`load_and_validate`] over an arbitrary filesystem.
pub fn load_and_validate_with(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<PipelineFile> {
    let raw = load_from_path(fs, path)?;
    PipelineFile::try_from(raw)
}

/// Default pipeline file: `Stagehand.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Stagehand.toml")
}
