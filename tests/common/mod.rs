#![allow(dead_code)]

pub use stagehand_test_utils::builders;
pub use stagehand_test_utils::fake_backend::{FakeBackend, FakeRepo};
pub use stagehand_test_utils::{init_tracing, process_group_members, with_timeout};

use std::sync::Arc;

use stagehand::config::RepoSpec;
use stagehand::exec::CommandRunner;
use stagehand::fs::mock::MockFileSystem;
use stagehand::sync::RepoSyncCoordinator;

pub const BASE: &str = "/work";

/// A resolved repository on `branch` with the default URL scheme.
pub fn repo(path: &str, branch: &str) -> RepoSpec {
    RepoSpec {
        path: path.to_string(),
        url: format!("git@github.com:gisce/{path}.git"),
        branch: branch.to_string(),
        user: "gisce".to_string(),
        tests: Vec::new(),
    }
}

/// Coordinator over `backend`, with `/work` as the base directory.
pub fn coordinator(backend: &FakeBackend, fs: &MockFileSystem) -> RepoSyncCoordinator {
    RepoSyncCoordinator::new(
        CommandRunner::new(Arc::new(backend.clone())),
        Arc::new(fs.clone()),
        BASE,
    )
}
