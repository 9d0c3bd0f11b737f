// src/sync/mod.rs

//! Repository synchronisation.
//!
//! - [`changes`] defines the [`ChangeSet`] built by a sync run.
//! - [`git`] holds the git command lines and output parsing.
//! - [`coordinator`] runs clone/fetch per repository across a bounded
//!   worker pool and the sequential rebase pass.

pub mod changes;
pub mod coordinator;
pub mod git;

pub use changes::{ChangeSet, CommitInfo, RepoChanges};
pub use coordinator::{
    RebaseOutcome, RepoRebaseReport, RepoSyncCoordinator, RepoSyncReport, SyncOutcome,
    SyncResult, sync_one,
};
