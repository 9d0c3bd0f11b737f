// src/pipeline/run.rs

//! A whole run: update, configured stages, service + tests, summary.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

use crate::config::{PipelineFile, RepoSpec, ServiceConfig, StepConfig};
use crate::errors::{Result, StagehandError};
use crate::exec::{CommandBackend, CommandRunner, FailurePolicy, ShellBackend, TemplateArgs};
use crate::fs::{FileSystem, RealFileSystem};
use crate::progress::{HasFailure, ProgressTree, SnapshotWriter};
use crate::report::{self, Granularity};
use crate::service::{wait_until_ready, with_background_service};
use crate::sync::{ChangeSet, RepoSyncCoordinator};

use super::context::RunContext;

pub const UPDATE_STAGE: &str = "Update";
pub const SERVICE_STAGE: &str = "Service";
pub const TESTING_STAGE: &str = "Testing";

/// Switches that come from the command line rather than the pipeline file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Continue past an update that found nothing new.
    pub force: bool,
    pub skip_update: bool,
    pub skip_tests: bool,
    /// Overrides `project.parallelism` when set.
    pub jobs: Option<usize>,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    /// No command failed and nothing aborted the run.
    pub success: bool,
    /// The error that stopped the run early, if any.
    pub aborted: Option<StagehandError>,
    /// The update found nothing new and the run stopped there.
    pub no_changes: bool,
    pub tree: ProgressTree,
    pub changes: ChangeSet,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineFile,
    options: RunOptions,
    runner: CommandRunner,
    fs: Arc<dyn FileSystem>,
}

impl Pipeline {
    /// Pipeline over the real shell and filesystem.
    pub fn new(config: PipelineFile, options: RunOptions) -> Self {
        Self::with_backend(
            config,
            options,
            Arc::new(ShellBackend::new()),
            Arc::new(RealFileSystem),
        )
    }

    pub fn with_backend(
        config: PipelineFile,
        options: RunOptions,
        backend: Arc<dyn CommandBackend>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            config,
            options,
            runner: CommandRunner::new(backend),
            fs,
        }
    }

    pub fn working_path(&self) -> &Path {
        &self.config.project.working_path
    }

    fn parallelism(&self) -> usize {
        self.options.jobs.unwrap_or(self.config.project.parallelism).max(1)
    }

    fn force(&self) -> bool {
        self.options.force || self.config.project.force
    }

    fn snapshot_path(&self) -> PathBuf {
        self.working_path().join(&self.config.project.snapshot)
    }

    /// Drive the whole run until it ends or SIGINT/SIGTERM arrives. Only
    /// setup problems (an unusable working path) surface as `Err`;
    /// everything after that ends up in the report.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_until(shutdown_signal()).await
    }

    /// Like [`Pipeline::run`], but stops when `interrupt` resolves.
    ///
    /// The in-flight work is dropped: a running command is killed, a
    /// background service has its process group torn down, and the command
    /// that was running is recorded as failed before the final snapshot.
    pub async fn run_until<F>(&self, interrupt: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let root = self.working_path().to_path_buf();
        self.fs.create_dir_all(&root)?;

        let mut ctx = RunContext::new(self.runner.clone(), Arc::clone(&self.fs), &root)
            .with_snapshot(SnapshotWriter::new(Arc::clone(&self.fs), self.snapshot_path()));
        let mut changes = ChangeSet::new();

        let outcome = tokio::select! {
            biased;

            _ = interrupt => Err(StagehandError::Interrupted),
            result = self.drive(&mut ctx, &mut changes) => result,
        };

        let (aborted, no_changes) = match outcome {
            Ok(()) => (None, false),
            Err(StagehandError::NoChanges) => {
                info!("no upstream changes; nothing to do");
                (None, true)
            }
            Err(StagehandError::Interrupted) => {
                ctx.seal_interrupted();
                error!("run interrupted");
                (Some(StagehandError::Interrupted), false)
            }
            Err(e) => {
                error!(error = %e, "run aborted");
                (Some(e), false)
            }
        };

        // Best effort from here on: a failing write must not hide the
        // outcome of the run itself.
        let _ = ctx.persist();
        let tree = ctx.into_tree();
        self.publish_status(&tree, &changes, false);

        let summary = report::render_summary(&tree, &changes);
        let success = aborted.is_none() && !tree.has_failure();
        info!(success, "run finished");

        Ok(RunReport {
            success,
            aborted,
            no_changes,
            tree,
            changes,
            summary,
        })
    }

    async fn drive(&self, ctx: &mut RunContext, changes: &mut ChangeSet) -> Result<()> {
        if self.options.skip_update {
            info!("skipping repository update");
        } else if self.config.repositories.is_empty() {
            info!("no repositories configured");
        } else {
            *changes = self.update(ctx).await?;
            self.publish_status(ctx.tree(), changes, true);
            let update_failed = ctx.tree().current_stage().is_some_and(|s| s.has_failure());
            if changes.is_empty() && !update_failed && !self.force() {
                return Err(StagehandError::NoChanges);
            }
        }

        for stage in &self.config.stages {
            ctx.stage(&stage.name)?;
            for step in &stage.step {
                self.run_step(ctx, step).await?;
            }
            self.publish_status(ctx.tree(), changes, true);
        }

        if self.options.skip_tests {
            info!("skipping tests");
            return Ok(());
        }
        if !self.config.repositories.iter().any(RepoSpec::has_tests) {
            info!("no repository defines tests");
            return Ok(());
        }

        match &self.config.service {
            Some(service) => self.serve_and_test(ctx, service).await,
            None => self.testing(ctx).await,
        }
    }

    async fn update(&self, ctx: &mut RunContext) -> Result<ChangeSet> {
        ctx.stage(UPDATE_STAGE)?;
        let repos = &self.config.repositories;
        let coordinator =
            RepoSyncCoordinator::new(ctx.runner().clone(), Arc::clone(ctx.fs()), ctx.cwd());

        let synced = coordinator.sync(repos, self.parallelism()).await;
        for report in synced.reports {
            ctx.push_step(report.step);
        }

        for report in coordinator.rebase_all(repos, &synced.changes).await {
            if let Err(e) = &report.result {
                warn!(repo = %report.path, error = %e, "repository left at its pre-rebase state");
            }
            ctx.push_step(report.step);
        }

        ctx.persist()?;
        Ok(synced.changes)
    }

    async fn run_step(&self, ctx: &mut RunContext, step: &StepConfig) -> Result<()> {
        ctx.step(&step.name);
        let args = self.base_args();
        match &step.dir {
            Some(dir) => {
                let mut scope = ctx.enter(dir);
                run_all(&mut scope, step.policy, &step.commands, &args).await
            }
            None => run_all(ctx, step.policy, &step.commands, &args).await,
        }
    }

    async fn serve_and_test(&self, ctx: &mut RunContext, service: &ServiceConfig) -> Result<()> {
        ctx.stage(SERVICE_STAGE)?;
        ctx.step("Start");

        let dir = match &service.dir {
            Some(dir) => ctx.cwd().join(dir),
            None => ctx.cwd().to_path_buf(),
        };
        let grace = Duration::from_millis(service.grace_ms);

        with_background_service(&service.command, &dir, grace, move |svc| async move {
            let target = format!("wait for {}:{}", service.host, service.port);
            info!(process_group = svc.process_group, "{target}");
            ctx.begin(target);
            ctx.persist()?;

            let started = Instant::now();
            let ready = wait_until_ready(&service.host, service.port, service.timeout_secs).await;
            let elapsed = started.elapsed().as_secs_f64();

            match ready {
                Ok(()) => {
                    ctx.finish_last(elapsed, None);
                    self.testing(ctx).await
                }
                Err(e) => {
                    error!(error = %e, "service not ready; skipping tests");
                    ctx.finish_last(elapsed, Some(e.to_string()));
                    ctx.persist()
                }
            }
        })
        .await
    }

    async fn testing(&self, ctx: &mut RunContext) -> Result<()> {
        ctx.stage(TESTING_STAGE)?;
        for repo in self.config.repositories.iter().filter(|r| r.has_tests()) {
            ctx.step(&repo.path);
            let args = self
                .base_args()
                .named("path", &repo.path)
                .named("branch", &repo.branch)
                .named("url", &repo.url);

            let mut scope = ctx.enter(&repo.path);
            let outputs = run_all(&mut scope, FailurePolicy::Diagnostic, &repo.tests, &args).await;
            drop(scope);
            outputs?;

            if ctx.tree().current_step().is_some_and(|s| s.has_failure()) {
                warn!(repo = %repo.path, "tests failed");
            } else {
                info!(repo = %repo.path, "tests passed");
            }
        }
        ctx.persist()
    }

    /// Keyword arguments every command template may use.
    fn base_args(&self) -> TemplateArgs {
        TemplateArgs::new()
            .named("project", &self.config.project.name)
            .named("working_path", self.working_path().display().to_string())
    }

    fn publish_status(&self, tree: &ProgressTree, changes: &ChangeSet, in_progress: bool) {
        let Some(status) = &self.config.project.status else {
            return;
        };
        let path = self.working_path().join(status);
        let projection = report::export(
            &self.config.project.name,
            tree,
            changes,
            &Granularity::detailed(self.config.project.detailed_stages.iter().cloned()),
            in_progress,
        );

        let written = serde_json::to_vec_pretty(&projection)
            .map_err(StagehandError::from)
            .and_then(|bytes| Ok(self.fs.write(&path, &bytes)?));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "failed to export status");
        }
    }
}

/// Resolves on the first SIGINT or SIGTERM. A listener that cannot be
/// installed is logged and never fires.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => info!("received SIGINT; shutting down"),
        _ = terminate => info!("received SIGTERM; shutting down"),
    }
}

async fn run_all(
    ctx: &mut RunContext,
    policy: FailurePolicy,
    commands: &[String],
    args: &TemplateArgs,
) -> Result<()> {
    for command in commands {
        ctx.run(policy, command, args).await?;
    }
    Ok(())
}
