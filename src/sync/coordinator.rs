// src/sync/coordinator.rs

//! Clone/fetch many repositories, optionally in parallel, then rebase the
//! ones with pending upstream commits one at a time.
//!
//! Workers share nothing mutable. Each returns a [`RepoSyncReport`] value
//! (outcome plus its own command log); the coordinator slots reports back
//! by input position and derives the [`ChangeSet`] from them, so the result
//! does not depend on which worker finished first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::RepoSpec;
use crate::errors::{Result, StagehandError};
use crate::exec::{CommandRunner, FailurePolicy};
use crate::fs::FileSystem;
use crate::progress::{CommandRecord, Step};

use super::changes::{ChangeSet, CommitInfo};
use super::git;

/// How one repository's sync ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Path was missing; repository cloned.
    Cloned,
    /// Fetched; nothing new upstream.
    UpToDate,
    /// Fetched; these upstream commits are pending, oldest first.
    Pending(Vec<CommitInfo>),
    /// Checked out on a different branch than configured. Left untouched.
    BranchMismatch { current: String },
    /// A sync command failed; details are in the step's records.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RepoSyncReport {
    pub path: String,
    pub outcome: SyncOutcome,
    /// Commands this repository ran, named `Sync <path>`.
    pub step: Step,
}

#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub changes: ChangeSet,
    /// One report per input repository, in input order.
    pub reports: Vec<RepoSyncReport>,
}

/// How one repository's rebase went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    Rebased,
    /// Branch changed since sync (or never matched); not touched.
    Skipped { current: String },
}

#[derive(Debug)]
pub struct RepoRebaseReport {
    pub path: String,
    /// `Err(StagehandError::RebaseConflict)` when the rebase had to be
    /// aborted.
    pub result: Result<RebaseOutcome>,
    /// Commands this repository ran, named `Rebase <path>`.
    pub step: Step,
}

#[derive(Debug, Clone)]
pub struct RepoSyncCoordinator {
    runner: CommandRunner,
    fs: Arc<dyn FileSystem>,
    base: PathBuf,
}

impl RepoSyncCoordinator {
    /// `base` is the directory repository paths are relative to.
    pub fn new(runner: CommandRunner, fs: Arc<dyn FileSystem>, base: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            fs,
            base: base.into(),
        }
    }

    /// Synchronise every repository. `parallelism <= 1` runs them one after
    /// another; otherwise at most `parallelism` run at once and their
    /// console output may interleave.
    pub async fn sync(&self, repos: &[RepoSpec], parallelism: usize) -> SyncResult {
        info!(repositories = repos.len(), parallelism, "synchronising repositories");

        let reports = if parallelism <= 1 || repos.len() <= 1 {
            let mut reports = Vec::with_capacity(repos.len());
            for repo in repos {
                reports.push(sync_one(&self.runner, self.fs.as_ref(), &self.base, repo).await);
            }
            reports
        } else {
            self.sync_parallel(repos, parallelism).await
        };

        let changes = collect_changes(&reports);
        SyncResult { changes, reports }
    }

    async fn sync_parallel(&self, repos: &[RepoSpec], parallelism: usize) -> Vec<RepoSyncReport> {
        let permits = Arc::new(Semaphore::new(parallelism));
        let mut workers = JoinSet::new();

        for (idx, repo) in repos.iter().cloned().enumerate() {
            let runner = self.runner.clone();
            let fs = Arc::clone(&self.fs);
            let base = self.base.clone();
            let permits = Arc::clone(&permits);

            workers.spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = permits.acquire_owned().await.ok();
                (idx, sync_one(&runner, fs.as_ref(), &base, &repo).await)
            });
        }

        let mut slots: Vec<Option<RepoSyncReport>> = (0..repos.len()).map(|_| None).collect();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((idx, report)) => {
                    debug!(repo = %report.path, "sync worker finished");
                    slots[idx] = Some(report);
                }
                Err(e) => error!(error = %e, "sync worker panicked"),
            }
        }

        slots
            .into_iter()
            .zip(repos)
            .map(|(slot, repo)| {
                slot.unwrap_or_else(|| RepoSyncReport {
                    path: repo.path.clone(),
                    outcome: SyncOutcome::Failed("sync worker panicked".to_string()),
                    step: Step::new(sync_step_name(repo)),
                })
            })
            .collect()
    }

    /// Rebase, strictly sequentially, every repository whose change set
    /// entry lists pending commits. Cloned, up-to-date and mismatched
    /// repositories are never touched.
    pub async fn rebase_all(&self, repos: &[RepoSpec], changes: &ChangeSet) -> Vec<RepoRebaseReport> {
        let mut reports = Vec::new();
        for repo in repos {
            if changes.pending(&repo.path).is_none() {
                continue;
            }
            let mut step = Step::new(format!("Rebase {}", repo.path));
            let result = rebase_one(&self.runner, &self.base, repo, &mut step.commands).await;
            match &result {
                Ok(RebaseOutcome::Rebased) => info!(repo = %repo.path, "rebased onto upstream"),
                Ok(RebaseOutcome::Skipped { current }) => warn!(
                    repo = %repo.path,
                    expected = %repo.branch,
                    current = %current,
                    "branch changed; skipping rebase"
                ),
                Err(e) => error!(repo = %repo.path, error = %e, "rebase failed"),
            }
            reports.push(RepoRebaseReport {
                path: repo.path.clone(),
                result,
                step,
            });
        }
        reports
    }
}

fn sync_step_name(repo: &RepoSpec) -> String {
    format!("Sync {}", repo.path)
}

fn collect_changes(reports: &[RepoSyncReport]) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for report in reports {
        match &report.outcome {
            SyncOutcome::Cloned => changes.insert_cloned(&report.path),
            SyncOutcome::Pending(commits) => changes.insert_pending(&report.path, commits.clone()),
            SyncOutcome::UpToDate | SyncOutcome::BranchMismatch { .. } | SyncOutcome::Failed(_) => {}
        }
    }
    changes
}

/// Synchronise one repository. Never fails: errors become
/// [`SyncOutcome::Failed`] so the other repositories carry on.
pub async fn sync_one(
    runner: &CommandRunner,
    fs: &dyn FileSystem,
    base: &Path,
    repo: &RepoSpec,
) -> RepoSyncReport {
    let mut step = Step::new(sync_step_name(repo));
    let outcome = match sync_commands(runner, fs, base, repo, &mut step.commands).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(repo = %repo.path, error = %e, "repository sync failed");
            SyncOutcome::Failed(e.to_string())
        }
    };
    RepoSyncReport {
        path: repo.path.clone(),
        outcome,
        step,
    }
}

async fn sync_commands(
    runner: &CommandRunner,
    fs: &dyn FileSystem,
    base: &Path,
    repo: &RepoSpec,
    log: &mut Vec<CommandRecord>,
) -> Result<SyncOutcome> {
    let repo_dir = base.join(&repo.path);

    if !fs.exists(&repo_dir) {
        info!(repo = %repo.path, url = %repo.url, branch = %repo.branch, "cloning repository");
        runner
            .run(log, FailurePolicy::FailFast, &git::clone_command(repo)?, base)
            .await?;
        return Ok(SyncOutcome::Cloned);
    }

    info!(repo = %repo.path, "fetching changes");
    runner
        .run(log, FailurePolicy::BestEffort, git::FETCH, &repo_dir)
        .await?;

    let current = current_branch(runner, &repo_dir, log).await?;
    if current != repo.branch {
        warn!(
            repo = %repo.path,
            expected = %repo.branch,
            current = %current,
            "repository is on a different branch; leaving it alone"
        );
        return Ok(SyncOutcome::BranchMismatch { current });
    }

    let listed = runner
        .run(log, FailurePolicy::FailFast, git::UPSTREAM_COMMITS, &repo_dir)
        .await?;
    let commits = git::parse_commits(&listed.stdout);
    if commits.is_empty() {
        debug!(repo = %repo.path, "up to date");
        Ok(SyncOutcome::UpToDate)
    } else {
        info!(repo = %repo.path, pending = commits.len(), "upstream changes pending");
        Ok(SyncOutcome::Pending(commits))
    }
}

async fn current_branch(
    runner: &CommandRunner,
    repo_dir: &Path,
    log: &mut Vec<CommandRecord>,
) -> Result<String> {
    let out = runner
        .run(log, FailurePolicy::FailFast, git::CURRENT_BRANCH, repo_dir)
        .await?;
    Ok(out.stdout.trim().to_string())
}

async fn rebase_one(
    runner: &CommandRunner,
    base: &Path,
    repo: &RepoSpec,
    log: &mut Vec<CommandRecord>,
) -> Result<RebaseOutcome> {
    let repo_dir = base.join(&repo.path);

    let current = current_branch(runner, &repo_dir, log).await?;
    if current != repo.branch {
        return Ok(RebaseOutcome::Skipped { current });
    }

    info!(repo = %repo.path, "rebasing");
    let rebase = runner
        .run(log, FailurePolicy::Diagnostic, git::REBASE, &repo_dir)
        .await?;
    if rebase.success() {
        return Ok(RebaseOutcome::Rebased);
    }

    warn!(repo = %repo.path, "rebase failed; aborting to restore the working tree");
    runner
        .run(log, FailurePolicy::BestEffort, git::REBASE_ABORT, &repo_dir)
        .await?;
    Err(StagehandError::RebaseConflict {
        repo: repo.path.clone(),
        output: rebase.combined,
    })
}
