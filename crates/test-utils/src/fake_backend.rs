use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use stagehand::exec::{CommandBackend, CommandOutput, ExecFuture};
use stagehand::fs::mock::MockFileSystem;
use stagehand::sync::git;

/// State of one simulated checkout.
#[derive(Debug, Clone)]
pub struct FakeRepo {
    pub branch: String,
    /// Upstream commits not yet present locally, oldest first.
    pub upstream: Vec<(String, String, String)>,
    /// `git rebase` fails with a conflict.
    pub conflict: bool,
    /// Added to every `git fetch --all`.
    pub fetch_delay: Duration,
}

impl FakeRepo {
    pub fn on(branch: &str) -> Self {
        Self {
            branch: branch.to_string(),
            upstream: Vec::new(),
            conflict: false,
            fetch_delay: Duration::ZERO,
        }
    }

    pub fn with_upstream(mut self, id: &str, date: &str, subject: &str) -> Self {
        self.upstream
            .push((id.to_string(), date.to_string(), subject.to_string()));
        self
    }

    pub fn conflicting(mut self) -> Self {
        self.conflict = true;
        self
    }

    pub fn slow_fetch(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    repos: HashMap<PathBuf, FakeRepo>,
    /// Exact command line -> (exit code, stdout). Checked before git.
    responses: HashMap<String, (i32, String)>,
    executed: Vec<(String, PathBuf)>,
}

/// A scripted command backend that:
/// - answers the git commands the sync coordinator issues from an
///   in-memory model of each checkout (keyed by its directory)
/// - creates the checkout directory in a `MockFileSystem` on `git clone`
/// - records every command and the directory it ran in
/// - succeeds silently for anything it does not know
#[derive(Debug, Clone)]
pub struct FakeBackend {
    fs: MockFileSystem,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new(fs: MockFileSystem) -> Self {
        Self {
            fs,
            state: Arc::default(),
        }
    }

    /// An existing checkout at `dir`.
    pub fn with_repo(self, dir: impl Into<PathBuf>, repo: FakeRepo) -> Self {
        let dir = dir.into();
        self.fs.add_dir(&dir);
        self.lock().repos.insert(dir, repo);
        self
    }

    /// Fixed answer for an exact command line.
    pub fn respond(self, command: &str, exit_code: i32, stdout: &str) -> Self {
        self.lock()
            .responses
            .insert(command.to_string(), (exit_code, stdout.to_string()));
        self
    }

    /// Every `(command, cwd)` seen so far, in call order.
    pub fn executed(&self) -> Vec<(String, PathBuf)> {
        self.lock().executed.clone()
    }

    /// Commands that ran with `dir` as their working directory.
    pub fn commands_in(&self, dir: impl AsRef<Path>) -> Vec<String> {
        self.lock()
            .executed
            .iter()
            .filter(|(_, cwd)| cwd == dir.as_ref())
            .map(|(command, _)| command.clone())
            .collect()
    }

    pub fn repo(&self, dir: impl AsRef<Path>) -> Option<FakeRepo> {
        self.lock().repos.get(dir.as_ref()).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide the outcome without holding the lock across an await.
    fn answer(&self, command: &str, cwd: &Path) -> (Duration, i32, String) {
        let mut state = self.lock();
        state.executed.push((command.to_string(), cwd.to_path_buf()));

        if let Some((code, stdout)) = state.responses.get(command) {
            return (Duration::ZERO, *code, stdout.clone());
        }

        if let Some(rest) = command.strip_prefix("git clone ") {
            // git clone <url> <path> --branch <branch>
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if let [_url, path, "--branch", branch] = parts.as_slice() {
                let dir = cwd.join(path);
                self.fs.add_dir(&dir);
                state.repos.insert(dir, FakeRepo::on(branch));
                return (Duration::ZERO, 0, String::new());
            }
            return (Duration::ZERO, 128, "usage: git clone".to_string());
        }

        let Some(repo) = state.repos.get_mut(cwd) else {
            if command.starts_with("git ") {
                return (Duration::ZERO, 128, "fatal: not a git repository".to_string());
            }
            return (Duration::ZERO, 0, String::new());
        };

        match command {
            git::FETCH => (repo.fetch_delay, 0, String::new()),
            git::CURRENT_BRANCH => (Duration::ZERO, 0, format!("{}\n", repo.branch)),
            git::UPSTREAM_COMMITS => {
                let lines: Vec<String> = repo
                    .upstream
                    .iter()
                    .map(|(id, date, subject)| format!("{id}\t{date}\t{subject}"))
                    .collect();
                (Duration::ZERO, 0, lines.join("\n"))
            }
            git::REBASE_ABORT => (Duration::ZERO, 0, String::new()),
            git::REBASE if repo.conflict => (
                Duration::ZERO,
                1,
                "CONFLICT (content): Merge conflict in README\n".to_string(),
            ),
            git::REBASE => {
                repo.upstream.clear();
                (Duration::ZERO, 0, String::new())
            }
            _ => (Duration::ZERO, 0, String::new()),
        }
    }
}

impl CommandBackend for FakeBackend {
    fn execute<'a>(&'a self, command: &'a str, cwd: &'a Path) -> ExecFuture<'a> {
        Box::pin(async move {
            let (delay, exit_code, stdout) = self.answer(command, cwd);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(CommandOutput {
                exit_code,
                combined: stdout.clone(),
                stdout,
                ..Default::default()
            })
        })
    }
}
