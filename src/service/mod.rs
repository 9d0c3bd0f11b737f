// src/service/mod.rs

//! Background service handling: a supervisor that owns the service's
//! process group for the length of a scope, and a TCP poller that tells
//! when the service is actually accepting connections.

pub mod readiness;
pub mod supervisor;

pub use readiness::{poll_until_open, wait_until_ready};
pub use supervisor::{ServiceGuard, ServiceInfo, with_background_service};
