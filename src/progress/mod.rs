// src/progress/mod.rs

//! Hierarchical run telemetry.
//!
//! - [`tree`] holds the typed Stage -> Step -> CommandRecord tree and the
//!   [`HasFailure`] query.
//! - [`snapshot`] persists the tree as JSON after each stage and on exit.

pub mod snapshot;
pub mod tree;

pub use snapshot::SnapshotWriter;
pub use tree::{CommandRecord, HasFailure, IMPLICIT_NAME, ProgressTree, Stage, Step};
