// src/config/validate.rs

use std::collections::HashSet;
use std::path::{Component, Path};

use crate::config::model::{PipelineFile, RawPipelineFile, RawRepoConfig, RepoDefaults, RepoSpec};
use crate::errors::{Result, StagehandError};
use crate::exec::{TemplateArgs, render};

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = crate::errors::StagehandError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let repositories = raw
            .repository
            .iter()
            .map(|repo| resolve_repo(repo, &raw.defaults))
            .collect::<Result<Vec<_>>>()?;
        Ok(PipelineFile::new_unchecked(
            raw.project,
            repositories,
            raw.service,
            raw.stage,
        ))
    }
}

fn validate_raw_config(cfg: &RawPipelineFile) -> Result<()> {
    validate_project(cfg)?;
    validate_repositories(cfg)?;
    validate_service(cfg)?;
    validate_stages(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> StagehandError {
    StagehandError::ConfigError(msg.into())
}

fn validate_project(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.project.parallelism == 0 {
        return Err(config_error("[project].parallelism must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_repositories(cfg: &RawPipelineFile) -> Result<()> {
    let mut seen = HashSet::new();
    for repo in cfg.repository.iter() {
        if repo.path.trim().is_empty() {
            return Err(config_error("[[repository]] entry with an empty `path`"));
        }
        if !is_plain_relative(Path::new(&repo.path)) {
            return Err(config_error(format!(
                "repository path '{}' must be relative and stay inside the working path",
                repo.path
            )));
        }
        if !seen.insert(repo.path.as_str()) {
            return Err(config_error(format!(
                "repository '{}' is listed more than once",
                repo.path
            )));
        }
        if repo.tests.iter().any(|t| t.trim().is_empty()) {
            return Err(config_error(format!(
                "repository '{}' has an empty test command",
                repo.path
            )));
        }
    }
    Ok(())
}

fn validate_service(cfg: &RawPipelineFile) -> Result<()> {
    if let Some(service) = &cfg.service {
        if service.command.trim().is_empty() {
            return Err(config_error("[service].command must not be empty"));
        }
        if service.port == 0 {
            return Err(config_error("[service].port must be a real port (got 0)"));
        }
    }
    Ok(())
}

fn validate_stages(cfg: &RawPipelineFile) -> Result<()> {
    for stage in cfg.stage.iter() {
        if stage.name.trim().is_empty() {
            return Err(config_error("[[stage]] entry with an empty `name`"));
        }
        for step in stage.step.iter() {
            if step.commands.is_empty() {
                return Err(config_error(format!(
                    "step '{}' in stage '{}' has no commands",
                    step.name, stage.name
                )));
            }
        }
    }
    Ok(())
}

/// Relative, and never climbing out through `..`.
fn is_plain_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn resolve_repo(repo: &RawRepoConfig, defaults: &RepoDefaults) -> Result<RepoSpec> {
    let user = repo.user.clone().unwrap_or_else(|| defaults.user.clone());
    let branch = repo.branch.clone().unwrap_or_else(|| defaults.branch.clone());
    let url = match &repo.url {
        Some(url) => url.clone(),
        None => {
            let args = TemplateArgs::new()
                .named("user", &user)
                .named("path", &repo.path);
            render(&defaults.url_template, &args).map_err(|e| {
                config_error(format!("[defaults].url_template for '{}': {e}", repo.path))
            })?
        }
    };

    Ok(RepoSpec {
        path: repo.path.clone(),
        url,
        branch,
        user,
        tests: repo.tests.clone(),
    })
}
