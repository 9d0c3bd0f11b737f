// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::FailurePolicy;

/// Pipeline file exactly as read from TOML, before defaults that depend on
/// other fields (repository URLs) are resolved.
///
/// ```toml
/// [project]
/// name = "erp"
/// working_path = "/srv/erp"
/// parallelism = 4
///
/// [defaults]
/// user = "gisce"
///
/// [[repository]]
/// path = "erp"
/// branch = "developer"
/// tests = ["./tools/run_tests.sh"]
///
/// [service]
/// command = "./erp/server/bin/openerp-server.py"
/// port = 8069
///
/// [[stage]]
/// name = "Deploy"
///
/// [[stage.step]]
/// name = "Link addons"
/// dir = "erp"
/// commands = ["./tools/link_addons.sh"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub defaults: RepoDefaults,

    #[serde(default)]
    pub repository: Vec<RawRepoConfig>,

    #[serde(default)]
    pub service: Option<ServiceConfig>,

    #[serde(default)]
    pub stage: Vec<StageConfig>,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Directory everything happens in; created if missing.
    #[serde(default = "default_working_path")]
    pub working_path: PathBuf,

    /// Width of the repository sync worker pool. `1` means sequential.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Progress snapshot, relative to `working_path`.
    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,

    /// Dashboard export, relative to `working_path`. Not written if unset.
    #[serde(default)]
    pub status: Option<PathBuf>,

    /// Stages reported per step instead of as a single unit.
    #[serde(default = "default_detailed_stages")]
    pub detailed_stages: Vec<String>,

    /// Keep going after the update stage even if nothing changed upstream.
    #[serde(default)]
    pub force: bool,
}

fn default_project_name() -> String {
    "stagehand".to_string()
}

fn default_working_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_parallelism() -> usize {
    1
}

fn default_snapshot() -> PathBuf {
    PathBuf::from("results.json")
}

fn default_detailed_stages() -> Vec<String> {
    vec!["Testing".to_string()]
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            working_path: default_working_path(),
            parallelism: default_parallelism(),
            snapshot: default_snapshot(),
            status: None,
            detailed_stages: default_detailed_stages(),
            force: false,
        }
    }
}

/// `[defaults]` section: fallbacks for `[[repository]]` entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoDefaults {
    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Rendered with `{user}` and `{path}` when a repository has no `url`.
    #[serde(default = "default_url_template")]
    pub url_template: String,
}

fn default_user() -> String {
    "gisce".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_url_template() -> String {
    "git@github.com:{user}/{path}.git".to_string()
}

impl Default for RepoDefaults {
    fn default() -> Self {
        Self {
            user: default_user(),
            branch: default_branch(),
            url_template: default_url_template(),
        }
    }
}

/// `[[repository]]` entry as written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRepoConfig {
    /// Checkout directory relative to the working path. Also the
    /// repository's identity in change sets and reports.
    pub path: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub tests: Vec<String>,
}

/// A repository with every default applied. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    pub path: String,
    pub url: String,
    pub branch: String,
    pub user: String,
    pub tests: Vec<String>,
}

impl RepoSpec {
    pub fn has_tests(&self) -> bool {
        !self.tests.is_empty()
    }
}

/// `[service]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub command: String,

    /// Directory to start the service in, relative to the working path.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    pub port: u16,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Grace window after each termination signal, in milliseconds.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_grace_ms() -> u64 {
    1000
}

/// `[[stage]]` entry: a named phase of user-supplied commands.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    pub name: String,

    #[serde(default)]
    pub step: Vec<StepConfig>,
}

/// `[[stage.step]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub name: String,

    /// Directory the commands run in, relative to the working path.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    pub commands: Vec<String>,

    #[serde(default)]
    pub policy: FailurePolicy,
}

/// Validated pipeline definition.
///
/// Only constructible through `TryFrom<RawPipelineFile>`, which resolves
/// repository defaults and checks invariants.
#[derive(Debug, Clone)]
pub struct PipelineFile {
    pub project: ProjectSection,
    pub repositories: Vec<RepoSpec>,
    pub service: Option<ServiceConfig>,
    pub stages: Vec<StageConfig>,
}

impl PipelineFile {
    pub(crate) fn new_unchecked(
        project: ProjectSection,
        repositories: Vec<RepoSpec>,
        service: Option<ServiceConfig>,
        stages: Vec<StageConfig>,
    ) -> Self {
        Self {
            project,
            repositories,
            service,
            stages,
        }
    }

    pub fn repository(&self, path: &str) -> Option<&RepoSpec> {
        self.repositories.iter().find(|r| r.path == path)
    }
}
