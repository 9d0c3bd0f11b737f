// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] launches `sh -c` children and multiplexes their stdout and
//!   stderr live into a [`CommandOutput`].
//! - [`backend`] provides the `CommandBackend` trait and the production
//!   `ShellBackend`; tests swap in a scripted implementation.
//! - [`runner`] applies a [`FailurePolicy`] and records every command into
//!   the progress tree.
//! - [`template`] expands `{}` / `{name}` placeholders in command strings.

pub mod backend;
pub mod command;
pub mod runner;
pub mod template;

pub use backend::{CommandBackend, ExecFuture, ShellBackend};
pub use command::{CommandOutput, shell_command};
pub use runner::{CommandRunner, FailurePolicy};
pub use template::{TemplateArgs, render};
