// src/config/mod.rs

//! Pipeline file loading and validation for stagehand.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a pipeline file from disk (`loader.rs`).
//! - Resolve repository defaults and check invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_and_validate_with, load_from_path};
pub use model::{
    PipelineFile, ProjectSection, RawPipelineFile, RawRepoConfig, RepoDefaults, RepoSpec,
    ServiceConfig, StageConfig, StepConfig,
};
