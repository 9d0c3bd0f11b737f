// src/report/mod.rs

//! Read-only views over a finished or in-progress run.

pub mod dashboard;
pub mod summary;

pub use dashboard::{Activity, Granularity, StatusProjection, StatusUnit, UnitStatus, export};
pub use summary::render_summary;
