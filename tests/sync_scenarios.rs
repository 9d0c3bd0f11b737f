// tests/sync_scenarios.rs

mod common;

use std::path::Path;

use common::{BASE, FakeBackend, FakeRepo, coordinator, init_tracing, repo};
use stagehand::errors::StagehandError;
use stagehand::fs::FileSystem;
use stagehand::fs::mock::MockFileSystem;
use stagehand::sync::{ChangeSet, RebaseOutcome, RepoChanges, SyncOutcome, git};

#[tokio::test]
async fn missing_repository_is_cloned_and_never_rebased() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeBackend::new(fs.clone());
    let coord = coordinator(&backend, &fs);
    let repos = vec![repo("alpha", "main")];

    let result = coord.sync(&repos, 1).await;

    assert_eq!(result.changes.get("alpha"), Some(&RepoChanges::Cloned));
    assert_eq!(result.reports[0].outcome, SyncOutcome::Cloned);
    assert_eq!(result.reports[0].step.name, "Sync alpha");
    assert!(fs.exists(Path::new("/work/alpha")));
    assert_eq!(
        backend.commands_in(BASE),
        vec!["git clone git@github.com:gisce/alpha.git alpha --branch main".to_string()]
    );

    let rebased = coord.rebase_all(&repos, &result.changes).await;
    assert!(rebased.is_empty());
    assert!(backend.commands_in("/work/alpha").is_empty());
}

#[tokio::test]
async fn branch_mismatch_contributes_nothing_and_is_not_rebased() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeBackend::new(fs.clone()).with_repo(
        "/work/beta",
        FakeRepo::on("feature").with_upstream("abc1234", "2024-05-02 10:00:00 +0200", "Upstream fix"),
    );
    let coord = coordinator(&backend, &fs);
    let repos = vec![repo("beta", "main")];

    let result = coord.sync(&repos, 1).await;

    assert!(!result.changes.contains("beta"));
    assert_eq!(
        result.reports[0].outcome,
        SyncOutcome::BranchMismatch {
            current: "feature".to_string()
        }
    );
    let ran = backend.commands_in("/work/beta");
    assert_eq!(ran, vec![git::FETCH.to_string(), git::CURRENT_BRANCH.to_string()]);

    // Even if handed a change set naming it, the rebase pass re-checks.
    let mut forced = ChangeSet::new();
    forced.insert_pending("beta", vec![stagehand::sync::CommitInfo {
        id: "abc1234".to_string(),
        date: "2024-05-02".to_string(),
        subject: "Upstream fix".to_string(),
    }]);
    let rebased = coord.rebase_all(&repos, &forced).await;
    assert!(matches!(
        rebased[0].result,
        Ok(RebaseOutcome::Skipped { ref current }) if current == "feature"
    ));
    assert!(!backend.commands_in("/work/beta").iter().any(|c| c == git::REBASE));
}

#[tokio::test]
async fn pending_commits_are_listed_oldest_first_then_rebased() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeBackend::new(fs.clone()).with_repo(
        "/work/erp",
        FakeRepo::on("developer")
            .with_upstream("1111111", "2024-05-01 09:00:00 +0200", "First")
            .with_upstream("2222222", "2024-05-02 09:00:00 +0200", "Second"),
    );
    let coord = coordinator(&backend, &fs);
    let repos = vec![repo("erp", "developer")];

    let result = coord.sync(&repos, 1).await;
    let pending = result.changes.pending("erp").unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, "1111111");
    assert_eq!(pending[1].subject, "Second");

    let rebased = coord.rebase_all(&repos, &result.changes).await;
    assert!(matches!(rebased[0].result, Ok(RebaseOutcome::Rebased)));
    assert_eq!(rebased[0].step.name, "Rebase erp");
    assert!(backend.repo("/work/erp").unwrap().upstream.is_empty());
}

#[tokio::test]
async fn second_sync_without_upstream_changes_is_empty() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeBackend::new(fs.clone())
        .with_repo(
            "/work/erp",
            FakeRepo::on("master").with_upstream("1111111", "2024-05-01", "First"),
        )
        .with_repo("/work/oorq", FakeRepo::on("master"));
    let coord = coordinator(&backend, &fs);
    let repos = vec![repo("erp", "master"), repo("oorq", "master")];

    let first = coord.sync(&repos, 2).await;
    assert_eq!(first.changes.len(), 1);
    coord.rebase_all(&repos, &first.changes).await;

    let second = coord.sync(&repos, 2).await;
    assert!(second.changes.is_empty());
    assert!(
        second
            .reports
            .iter()
            .all(|r| r.outcome == SyncOutcome::UpToDate)
    );
}

#[tokio::test]
async fn rebase_conflict_is_aborted_and_other_repositories_continue() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeBackend::new(fs.clone())
        .with_repo(
            "/work/erp",
            FakeRepo::on("master")
                .with_upstream("1111111", "2024-05-01", "Conflicting")
                .conflicting(),
        )
        .with_repo(
            "/work/oorq",
            FakeRepo::on("master").with_upstream("2222222", "2024-05-01", "Clean"),
        );
    let coord = coordinator(&backend, &fs);
    let repos = vec![repo("erp", "master"), repo("oorq", "master")];

    let result = coord.sync(&repos, 1).await;
    let rebased = coord.rebase_all(&repos, &result.changes).await;

    assert_eq!(rebased.len(), 2);
    match &rebased[0].result {
        Err(StagehandError::RebaseConflict { repo, output }) => {
            assert_eq!(repo, "erp");
            assert!(output.contains("CONFLICT"));
        }
        other => panic!("expected RebaseConflict, got {other:?}"),
    }
    assert!(matches!(rebased[1].result, Ok(RebaseOutcome::Rebased)));

    let erp = backend.commands_in("/work/erp");
    assert_eq!(erp.last().map(String::as_str), Some(git::REBASE_ABORT));

    // The failed rebase is on record; the abort itself succeeded.
    let step = &rebased[0].step;
    let rebase = step.commands.iter().find(|c| c.command == git::REBASE).unwrap();
    assert!(rebase.failed);
    assert!(rebase.output.as_deref().unwrap().contains("git rebase"));
    let abort = step.commands.iter().find(|c| c.command == git::REBASE_ABORT).unwrap();
    assert!(!abort.failed);
}

#[tokio::test]
async fn failed_clone_is_reported_without_an_entry() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeBackend::new(fs.clone()).respond(
        "git clone git@github.com:gisce/ghost.git ghost --branch master",
        128,
        "fatal: repository not found",
    );
    let coord = coordinator(&backend, &fs);
    let repos = vec![repo("ghost", "master"), repo("alpha", "master")];

    let result = coord.sync(&repos, 1).await;

    assert!(matches!(result.reports[0].outcome, SyncOutcome::Failed(_)));
    assert!(result.reports[0].step.commands[0].failed);
    assert!(!result.changes.contains("ghost"));
    assert_eq!(result.changes.get("alpha"), Some(&RepoChanges::Cloned));
}
