// src/exec/runner.rs

//! Policy-aware command execution with telemetry.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, StagehandError};
use crate::progress::CommandRecord;

use super::backend::{CommandBackend, ShellBackend};
use super::command::CommandOutput;

/// What a non-zero exit means to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the error and abort the whole run.
    #[default]
    FailFast,
    /// Log a warning and hand the result back.
    BestEffort,
    /// Hand the result back silently; the caller judges pass/fail.
    Diagnostic,
}

/// Executes commands through a [`CommandBackend`] and records each one.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct CommandRunner {
    backend: Arc<dyn CommandBackend>,
}

impl std::fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRunner").finish_non_exhaustive()
    }
}

impl CommandRunner {
    pub fn new(backend: Arc<dyn CommandBackend>) -> Self {
        Self { backend }
    }

    /// Runner over the real shell, forwarding output live.
    pub fn shell() -> Self {
        Self::new(Arc::new(ShellBackend::new()))
    }

    /// Run `command` in `cwd`, appending its record to `log`.
    ///
    /// The record is pushed before the command starts and sealed exactly
    /// once when it ends. Under [`FailurePolicy::FailFast`] a non-zero exit
    /// becomes [`StagehandError::CommandFailed`]; the other policies return
    /// the output either way.
    pub async fn run(
        &self,
        log: &mut Vec<CommandRecord>,
        policy: FailurePolicy,
        command: &str,
        cwd: &Path,
    ) -> Result<CommandOutput> {
        info!(command, cwd = %cwd.display(), "running");

        log.push(CommandRecord::started(command));
        let idx = log.len() - 1;
        let started = Instant::now();

        let mut output = match self.backend.execute(command, cwd).await {
            Ok(output) => output,
            Err(e) => CommandOutput {
                exit_code: -1,
                stderr: format!("failed to launch: {e}\n"),
                combined: format!("failed to launch: {e}\n"),
                ..Default::default()
            },
        };
        output.elapsed_seconds = started.elapsed().as_secs_f64();

        let failure = (!output.success()).then(|| failure_text(command, &output.combined));
        log[idx].finish(output.elapsed_seconds, failure);

        if output.success() {
            return Ok(output);
        }

        match policy {
            FailurePolicy::FailFast => {
                error!(command, exit_code = output.exit_code, "command failed");
                eprintln!("{}", output.combined);
                Err(StagehandError::CommandFailed {
                    command: command.to_string(),
                    exit_code: output.exit_code,
                    output: output.combined,
                })
            }
            FailurePolicy::BestEffort => {
                warn!(command, exit_code = output.exit_code, "command failed; continuing");
                eprintln!("{}", output.combined);
                Ok(output)
            }
            FailurePolicy::Diagnostic => {
                debug!(command, exit_code = output.exit_code, "command exited non-zero");
                Ok(output)
            }
        }
    }
}

/// Text stored on a failed record: the command line followed by everything
/// it printed.
fn failure_text(command: &str, combined: &str) -> String {
    format!("$ {command}\n{combined}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> CommandRunner {
        CommandRunner::new(Arc::new(ShellBackend::quiet()))
    }

    #[tokio::test]
    async fn success_seals_record_without_failure() {
        let mut log = Vec::new();
        let out = quiet()
            .run(&mut log, FailurePolicy::FailFast, "echo hello", &std::env::temp_dir())
            .await
            .unwrap();

        assert_eq!(out.stdout, "hello\n");
        assert_eq!(log.len(), 1);
        assert!(!log[0].failed);
        assert!(log[0].output.is_none());
        assert!(log[0].elapsed_seconds.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn fail_fast_returns_command_failed_with_output() {
        let mut log = Vec::new();
        let err = quiet()
            .run(&mut log, FailurePolicy::FailFast, "echo broken >&2; exit 1", &std::env::temp_dir())
            .await
            .unwrap_err();

        match err {
            StagehandError::CommandFailed {
                command,
                exit_code,
                output,
            } => {
                assert_eq!(command, "echo broken >&2; exit 1");
                assert_eq!(exit_code, 1);
                assert_eq!(output, "broken\n");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }

        assert!(log[0].failed);
        let recorded = log[0].output.as_deref().unwrap();
        assert!(recorded.contains("echo broken >&2; exit 1"));
        assert!(recorded.contains("broken"));
    }

    #[tokio::test]
    async fn best_effort_and_diagnostic_return_the_result() {
        let mut log = Vec::new();
        let runner = quiet();
        let tmp = std::env::temp_dir();

        let a = runner
            .run(&mut log, FailurePolicy::BestEffort, "exit 2", &tmp)
            .await
            .unwrap();
        let b = runner
            .run(&mut log, FailurePolicy::Diagnostic, "echo x; exit 5", &tmp)
            .await
            .unwrap();

        assert_eq!(a.exit_code, 2);
        assert_eq!(b.exit_code, 5);
        assert_eq!(b.stdout, "x\n");
        assert!(log.iter().all(|r| r.failed && r.is_finished()));
    }

    #[tokio::test]
    async fn launch_failure_is_recorded_as_a_failed_command() {
        let mut log = Vec::new();
        let missing_dir = std::env::temp_dir().join("stagehand-definitely-missing-dir");
        let out = quiet()
            .run(&mut log, FailurePolicy::BestEffort, "true", &missing_dir)
            .await
            .unwrap();

        assert_eq!(out.exit_code, -1);
        assert!(out.combined.contains("failed to launch"));
        assert!(log[0].failed);
    }
}
