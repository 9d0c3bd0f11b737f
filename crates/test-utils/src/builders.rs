#![allow(dead_code)]

use std::path::PathBuf;

use stagehand::config::{
    PipelineFile, RawPipelineFile, RawRepoConfig, ServiceConfig, StageConfig, StepConfig,
};
use stagehand::exec::FailurePolicy;

/// Builder for `PipelineFile` to simplify test setup.
pub struct PipelineBuilder {
    config: RawPipelineFile,
}

impl PipelineBuilder {
    /// Pipeline rooted at `working_path`, with no snapshot side effects
    /// beyond `results.json` in that directory.
    pub fn new(working_path: impl Into<PathBuf>) -> Self {
        let mut config = RawPipelineFile::default();
        config.project.name = "test".to_string();
        config.project.working_path = working_path.into();
        Self { config }
    }

    pub fn parallelism(mut self, n: usize) -> Self {
        self.config.project.parallelism = n;
        self
    }

    pub fn force(mut self) -> Self {
        self.config.project.force = true;
        self
    }

    pub fn status(mut self, path: &str) -> Self {
        self.config.project.status = Some(PathBuf::from(path));
        self
    }

    pub fn repo(mut self, repo: RepoBuilder) -> Self {
        self.config.repository.push(repo.repo);
        self
    }

    pub fn stage(mut self, name: &str, steps: Vec<StepConfig>) -> Self {
        self.config.stage.push(StageConfig {
            name: name.to_string(),
            step: steps,
        });
        self
    }

    pub fn service(mut self, command: &str, host: &str, port: u16, timeout_secs: u64) -> Self {
        self.config.service = Some(ServiceConfig {
            command: command.to_string(),
            dir: None,
            host: host.to_string(),
            port,
            timeout_secs,
            grace_ms: 200,
        });
        self
    }

    pub fn raw(self) -> RawPipelineFile {
        self.config
    }

    pub fn build(self) -> PipelineFile {
        PipelineFile::try_from(self.config).expect("Failed to build valid pipeline from builder")
    }
}

/// Builder for a `[[repository]]` entry.
pub struct RepoBuilder {
    repo: RawRepoConfig,
}

impl RepoBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            repo: RawRepoConfig {
                path: path.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.repo.branch = Some(branch.to_string());
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.repo.url = Some(url.to_string());
        self
    }

    pub fn test(mut self, command: &str) -> Self {
        self.repo.tests.push(command.to_string());
        self
    }
}

/// A `[[stage.step]]` entry.
pub fn step(name: &str, policy: FailurePolicy, commands: &[&str]) -> StepConfig {
    StepConfig {
        name: name.to_string(),
        dir: None,
        commands: commands.iter().map(|c| c.to_string()).collect(),
        policy,
    }
}
