// src/exec/backend.rs

//! Pluggable command backend abstraction.
//!
//! The runner talks to a `CommandBackend` instead of spawning processes
//! directly. Production code uses [`ShellBackend`]; tests can provide a
//! scripted backend that answers `git` commands without touching the
//! network or the real filesystem.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::errors::Result;

use super::command::{CommandOutput, run_captured};

/// Future returned by [`CommandBackend::execute`].
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + 'a>>;

/// Trait abstracting how a single shell command is executed.
///
/// Implementations must be shareable across repository sync workers.
pub trait CommandBackend: Send + Sync {
    /// Run `command` with `cwd` as its working directory and wait for it.
    ///
    /// A non-zero exit status is reported through
    /// [`CommandOutput::exit_code`], not as an `Err`.
    fn execute<'a>(&'a self, command: &'a str, cwd: &'a Path) -> ExecFuture<'a>;
}

/// Real backend: `sh -c` with live, multiplexed output capture.
#[derive(Debug, Clone)]
pub struct ShellBackend {
    echo: bool,
}

impl ShellBackend {
    /// Backend that forwards child output to our stdout/stderr as it arrives.
    pub fn new() -> Self {
        Self { echo: true }
    }

    /// Backend that only captures, printing nothing.
    pub fn quiet() -> Self {
        Self { echo: false }
    }
}

impl Default for ShellBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBackend for ShellBackend {
    fn execute<'a>(&'a self, command: &'a str, cwd: &'a Path) -> ExecFuture<'a> {
        Box::pin(run_captured(command, cwd, self.echo))
    }
}
