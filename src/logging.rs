// src/logging.rs

//! Logging setup for `stagehand` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `STAGEHAND_LOG` environment variable, either a bare level ("debug")
//!    or a full filter directive ("stagehand::sync=debug,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR. Live output of the commands being run is
//! forwarded to STDOUT/STDERR by the command runner itself, so a human
//! watching a run sees both interleaved in real time.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

const LOG_ENV: &str = "STAGEHAND_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let directive = match cli_level {
        Some(lvl) => lvl.as_directive().to_string(),
        None => std::env::var(LOG_ENV)
            .ok()
            .map(|s| normalise_directive(&s))
            .unwrap_or_else(|| "info".to_string()),
    };

    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Accept "warning" as an alias and trim whitespace; anything else is
/// handed to `EnvFilter` as-is.
fn normalise_directive(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed.to_lowercase().as_str() {
        "" => "info".to_string(),
        "warning" => "warn".to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_is_an_alias_for_warn() {
        assert_eq!(normalise_directive(" Warning "), "warn");
    }

    #[test]
    fn empty_falls_back_to_info() {
        assert_eq!(normalise_directive("  "), "info");
    }

    #[test]
    fn full_directives_pass_through() {
        assert_eq!(
            normalise_directive("stagehand::sync=debug,info"),
            "stagehand::sync=debug,info"
        );
        assert!(EnvFilter::try_new(normalise_directive("stagehand::sync=debug,info")).is_ok());
    }
}
