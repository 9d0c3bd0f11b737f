// tests/sync_parallel_property.rs

mod common;

use std::time::Duration;

use common::{FakeBackend, FakeRepo, coordinator, repo};
use proptest::prelude::*;
use stagehand::config::RepoSpec;
use stagehand::fs::mock::MockFileSystem;
use stagehand::sync::ChangeSet;

#[derive(Debug, Clone)]
enum Kind {
    Missing,
    UpToDate,
    Pending(usize),
    WrongBranch,
}

fn kind_strategy() -> impl Strategy<Value = Kind> {
    prop_oneof![
        Just(Kind::Missing),
        Just(Kind::UpToDate),
        (1usize..4).prop_map(Kind::Pending),
        Just(Kind::WrongBranch),
    ]
}

/// Build a fleet where every existing repository's fetch takes a random
/// amount of time, so workers finish in an arbitrary order.
fn fleet(kinds: &[(Kind, u64)]) -> (FakeBackend, MockFileSystem, Vec<RepoSpec>) {
    let fs = MockFileSystem::new();
    let mut backend = FakeBackend::new(fs.clone());
    let mut repos = Vec::new();

    for (i, (kind, delay_ms)) in kinds.iter().enumerate() {
        let path = format!("repo{i}");
        let delay = Duration::from_millis(*delay_ms);
        let dir = format!("/work/{path}");
        backend = match kind {
            Kind::Missing => backend,
            Kind::UpToDate => backend.with_repo(dir, FakeRepo::on("master").slow_fetch(delay)),
            Kind::Pending(n) => {
                let mut fake = FakeRepo::on("master").slow_fetch(delay);
                for c in 0..*n {
                    fake = fake.with_upstream(&format!("{i:03}{c:04}"), "2024-05-01", &format!("commit {c}"));
                }
                backend.with_repo(dir, fake)
            }
            Kind::WrongBranch => backend.with_repo(dir, FakeRepo::on("feature").slow_fetch(delay)),
        };
        repos.push(repo(&path, "master"));
    }

    (backend, fs, repos)
}

async fn sync_with(kinds: &[(Kind, u64)], parallelism: usize) -> ChangeSet {
    let (backend, fs, repos) = fleet(kinds);
    coordinator(&backend, &fs).sync(&repos, parallelism).await.changes
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn parallel_change_set_matches_sequential(
        kinds in proptest::collection::vec((kind_strategy(), 0u64..15), 1..8),
        parallelism in 2usize..5,
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let sequential = rt.block_on(sync_with(&kinds, 1));
        let parallel = rt.block_on(sync_with(&kinds, parallelism));
        prop_assert_eq!(&sequential, &parallel);

        for (i, (kind, _)) in kinds.iter().enumerate() {
            let path = format!("repo{i}");
            match kind {
                Kind::Missing => prop_assert!(parallel.get(&path).is_some()),
                Kind::Pending(n) => prop_assert_eq!(parallel.pending(&path).map(|p| p.len()), Some(*n)),
                Kind::UpToDate | Kind::WrongBranch => prop_assert!(!parallel.contains(&path)),
            }
        }
    }
}
