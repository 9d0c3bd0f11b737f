// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagehandError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    TemplateError(String),

    /// A command exited non-zero under the fail-fast policy.
    #[error("Command failed with exit code {exit_code}: {command}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    /// The service never accepted a connection before the deadline.
    #[error("{host}:{port} did not accept connections within {timeout_secs}s")]
    ReadinessTimeout {
        host: String,
        port: u16,
        timeout_secs: u64,
    },

    /// `git rebase` failed; the rebase has already been aborted.
    #[error("Rebase conflict in '{repo}' (rebase aborted)")]
    RebaseConflict { repo: String, output: String },

    #[error("No upstream changes; nothing to do")]
    NoChanges,

    /// SIGINT or SIGTERM arrived while the run was in progress.
    #[error("Interrupted by signal")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StagehandError {
    /// Captured command output attached to the error, if any.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            StagehandError::CommandFailed { output, .. }
            | StagehandError::RebaseConflict { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StagehandError>;
