// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod service;
pub mod sync;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::PipelineFile;
use crate::pipeline::{Pipeline, RunReport};

/// High-level entry point used by `main.rs`.
///
/// Loads the pipeline file, runs it (or prints it with `--dry-run`), prints
/// the summary and returns whether the run succeeded.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(true);
    }

    info!(project = %cfg.project.name, path = %config_path.display(), "starting run");
    let report = Pipeline::new(cfg, args.run_options()).run().await?;
    print_report(&report);
    Ok(report.success)
}

fn print_report(report: &RunReport) {
    println!();
    if report.no_changes && report.success {
        println!("No upstream changes; nothing to do.");
        return;
    }
    print!("{}", report.summary);

    if let Some(err) = &report.aborted {
        println!("Run aborted: {err}");
        if let Some(output) = err.captured_output() {
            println!("{output}");
        }
    }
}

/// Simple dry-run output: print repositories, stages and the service.
fn print_dry_run(cfg: &PipelineFile) {
    println!("stagehand dry-run");
    println!("  project.name = {}", cfg.project.name);
    println!("  project.working_path = {}", cfg.project.working_path.display());
    println!("  project.parallelism = {}", cfg.project.parallelism);
    println!();

    println!("repositories ({}):", cfg.repositories.len());
    for repo in &cfg.repositories {
        println!("  - {}", repo.path);
        println!("      url: {}", repo.url);
        println!("      branch: {}", repo.branch);
        if repo.has_tests() {
            println!("      tests: {:?}", repo.tests);
        }
    }

    println!("stages ({}):", cfg.stages.len());
    for stage in &cfg.stages {
        println!("  - {}", stage.name);
        for step in &stage.step {
            println!("      {} ({:?})", step.name, step.policy);
            if let Some(dir) = &step.dir {
                println!("        dir: {}", dir.display());
            }
            for command in &step.commands {
                println!("        $ {command}");
            }
        }
    }

    if let Some(service) = &cfg.service {
        println!("service:");
        println!("  command: {}", service.command);
        println!("  ready when {}:{} accepts (timeout {}s)", service.host, service.port, service.timeout_secs);
    }

    debug!("dry-run complete (no execution)");
}
