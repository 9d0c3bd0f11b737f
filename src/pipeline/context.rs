// src/pipeline/context.rs

//! Explicit per-run state threaded through every orchestration call.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::errors::Result;
use crate::exec::{CommandOutput, CommandRunner, FailurePolicy, TemplateArgs, render};
use crate::fs::FileSystem;
use crate::progress::{CommandRecord, ProgressTree, SnapshotWriter, Step};

/// Owns the progress tree of one run together with everything needed to
/// add to it. Two contexts never share state, so runs (e.g. in tests) do
/// not interfere.
#[derive(Debug)]
pub struct RunContext {
    runner: CommandRunner,
    fs: Arc<dyn FileSystem>,
    tree: ProgressTree,
    snapshot: Option<SnapshotWriter>,
    root: PathBuf,
    dirs: Vec<PathBuf>,
}

impl RunContext {
    /// Commands run in `root` until a [`DirScope`] says otherwise.
    pub fn new(runner: CommandRunner, fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            fs,
            tree: ProgressTree::new(),
            snapshot: None,
            root: root.into(),
            dirs: Vec::new(),
        }
    }

    pub fn with_snapshot(mut self, writer: SnapshotWriter) -> Self {
        self.snapshot = Some(writer);
        self
    }

    pub fn tree(&self) -> &ProgressTree {
        &self.tree
    }

    pub fn into_tree(self) -> ProgressTree {
        self.tree
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Directory the next command runs in.
    pub fn cwd(&self) -> &Path {
        self.dirs.last().unwrap_or(&self.root)
    }

    /// Open a stage and persist the tree.
    pub fn stage(&mut self, name: impl Into<String>) -> Result<()> {
        let stage = self.tree.stage(name);
        debug!(stage = %stage.name, "stage opened");
        self.persist()
    }

    pub fn step(&mut self, name: impl Into<String>) {
        self.tree.step(name);
    }

    /// Append a step that was filled elsewhere (a sync worker, say).
    pub fn push_step(&mut self, step: Step) {
        self.tree.push_step(step);
    }

    /// Render `template` with `args` and run it in the current directory.
    pub async fn run(
        &mut self,
        policy: FailurePolicy,
        template: &str,
        args: &TemplateArgs,
    ) -> Result<CommandOutput> {
        let command = render(template, args)?;
        self.run_command(policy, &command).await
    }

    /// Run an already-final command line in the current directory,
    /// recording it under the current step.
    pub async fn run_command(&mut self, policy: FailurePolicy, command: &str) -> Result<CommandOutput> {
        let cwd = self.cwd().to_path_buf();
        self.runner
            .run(&mut self.tree.current_step_mut().commands, policy, command, &cwd)
            .await
    }

    /// Open a record for something that is not a shell command (a
    /// readiness wait, for instance). Seal it with [`RunContext::finish_last`].
    pub fn begin(&mut self, command: impl Into<String>) {
        self.tree
            .current_step_mut()
            .commands
            .push(CommandRecord::started(command));
    }

    pub fn finish_last(&mut self, elapsed_seconds: f64, failure: Option<String>) {
        if let Some(record) = self.tree.current_step_mut().commands.last_mut() {
            record.finish(elapsed_seconds, failure);
        }
    }

    /// Fail the command that was still in flight when the run was cut
    /// short. Returns whether there was one.
    pub fn seal_interrupted(&mut self) -> bool {
        let Some(record) = self.tree.last_command_mut() else {
            return false;
        };
        if record.is_finished() {
            return false;
        }
        let elapsed = (Utc::now() - record.start_time).num_milliseconds() as f64 / 1000.0;
        let output = format!("$ {}\ninterrupted", record.command);
        warn!(command = %record.command, "interrupted while running");
        record.finish(elapsed, Some(output))
    }

    /// Run subsequent commands in `dir` (relative to the current directory)
    /// until the returned guard is dropped.
    pub fn enter(&mut self, dir: impl AsRef<Path>) -> DirScope<'_> {
        let next = self.cwd().join(dir);
        debug!(dir = %next.display(), "entering directory");
        self.dirs.push(next);
        DirScope { ctx: self }
    }

    /// Write the snapshot, if one is configured.
    pub fn persist(&self) -> Result<()> {
        match &self.snapshot {
            Some(writer) => writer.write(&self.tree).inspect_err(|e| {
                error!(path = %writer.path().display(), error = %e, "failed to write progress snapshot");
            }),
            None => Ok(()),
        }
    }
}

/// Directory scope on a [`RunContext`]. Derefs to the context; restores the
/// previous directory on drop.
#[derive(Debug)]
pub struct DirScope<'a> {
    ctx: &'a mut RunContext,
}

impl Deref for DirScope<'_> {
    type Target = RunContext;

    fn deref(&self) -> &RunContext {
        self.ctx
    }
}

impl DerefMut for DirScope<'_> {
    fn deref_mut(&mut self) -> &mut RunContext {
        self.ctx
    }
}

impl Drop for DirScope<'_> {
    fn drop(&mut self) {
        self.ctx.dirs.pop();
    }
}
