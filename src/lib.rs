// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod task;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::Scheduler;
use crate::exec::ProcessRunner;

pub use crate::dag::{DependencyGraph, DependsOn, ExecutionReport, RunOptions};
pub use crate::errors::RundagError;
pub use crate::task::{CommonTask, Task};
pub use crate::types::{FailurePolicy, InFlightPolicy};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - schedule file loading and validation
/// - scheduler + process runner
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dot {
        print!("{}", cfg.graph().to_dot());
        return Ok(());
    }

    let mut options = cfg.run_options();
    if let Some(n) = args.max_parallel {
        options.max_parallel = usize::from(n);
    }
    if let Some(in_flight) = args.in_flight {
        options.in_flight = in_flight;
    }
    let policy = args.policy.unwrap_or(cfg.config.policy);

    // Relative task locations resolve against the schedule file's directory.
    let runner = ProcessRunner::with_current_dir(config_root_dir(&config_path));
    let scheduler = Scheduler::with_runner(cfg.graph().clone(), runner).with_options(options);

    if args.dry_run {
        print_dry_run(&cfg, &scheduler, policy);
        return Ok(());
    }

    let outcome = tokio::select! {
        outcome = scheduler.run_tasks(policy) => outcome,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                bail!("failed to listen for Ctrl+C: {e}");
            }
            // The run future is dropped here, which aborts the level's
            // workers; their children are killed once the runtime shuts down
            // at the end of `main`.
            warn!("interrupted; stopping run");
            bail!("interrupted");
        }
    };

    match outcome {
        Ok(report) => {
            print!("{report}");
            let failed = report.failures().len();
            if failed > 0 {
                bail!("{failed} task(s) failed");
            }
            info!("all tasks succeeded");
            Ok(())
        }
        Err(err) => {
            if let Some(report) = err.report() {
                print!("{report}");
            }
            Err(err.into())
        }
    }
}

/// Directory containing the schedule file, or the current directory for a
/// bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Dry-run output: levels, tasks, commands and dependencies.
fn print_dry_run(cfg: &ConfigFile, scheduler: &Scheduler, policy: FailurePolicy) {
    println!("rundag dry-run");
    println!("  config.policy = {:?}", policy);
    println!("  config.in_flight = {:?}", scheduler.options().in_flight);
    println!("  config.max_parallel = {}", scheduler.options().max_parallel);
    println!();

    let levels = scheduler.levels();
    println!("levels ({}):", levels.len());
    for (level, tasks) in &levels {
        println!("  {level}:");
        for task in tasks {
            println!("    - {task}");
            println!("        cmd: {}", task.command_line());
            let deps = scheduler.graph().dependencies_of(task);
            if !deps.is_empty() {
                let names: Vec<String> = deps.iter().map(|t| t.to_string()).collect();
                println!("        after: {}", names.join(", "));
            }
        }
    }

    debug!(tasks = cfg.task.len(), "dry-run complete (no execution)");
}
