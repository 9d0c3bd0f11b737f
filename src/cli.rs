// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::pipeline::RunOptions;

/// Command-line arguments for `stagehand`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagehand",
    version,
    about = "Sync repositories, run deployment stages and test against a supervised service.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Stagehand.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STAGEHAND_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Number of repositories synchronised at once. Overrides
    /// `project.parallelism`.
    #[arg(long, short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Keep going even if the update found nothing new upstream.
    #[arg(long)]
    pub force: bool,

    /// Do not clone, fetch or rebase anything.
    #[arg(long)]
    pub skip_update: bool,

    /// Do not start the service or run repository tests.
    #[arg(long)]
    pub skip_tests: bool,

    /// Parse + validate, print the resolved plan, run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            force: self.force,
            skip_update: self.skip_update,
            skip_tests: self.skip_tests,
            jobs: self.jobs,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_run_options() {
        let args = CliArgs::parse_from([
            "stagehand",
            "--config",
            "ci/Stagehand.toml",
            "-j",
            "4",
            "--force",
            "--skip-tests",
        ]);
        assert_eq!(args.config, "ci/Stagehand.toml");

        let options = args.run_options();
        assert_eq!(options.jobs, Some(4));
        assert!(options.force);
        assert!(options.skip_tests);
        assert!(!options.skip_update);
    }

    #[test]
    fn defaults_to_stagehand_toml() {
        let args = CliArgs::parse_from(["stagehand"]);
        assert_eq!(args.config, "Stagehand.toml");
        assert!(args.log_level.is_none());
        assert!(!args.dry_run);
    }
}
