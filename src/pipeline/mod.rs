// src/pipeline/mod.rs

//! Orchestration of a complete run.
//!
//! - [`context`] holds the explicit per-run state ([`RunContext`]) and the
//!   directory scopes commands run in.
//! - [`run`] sequences the update, configured stages, the supervised
//!   service with its readiness gate, and the per-repository tests.

pub mod context;
pub mod run;

pub use context::{DirScope, RunContext};
pub use run::{
    Pipeline, RunOptions, RunReport, SERVICE_STAGE, TESTING_STAGE, UPDATE_STAGE, shutdown_signal,
};
