// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::{FailurePolicy, InFlightPolicy};

/// Command-line arguments for `rundag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rundag",
    version,
    about = "Run scripts level by level according to their dependencies.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the schedule file (TOML).
    ///
    /// Default: `Rundag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Rundag.toml")]
    pub config: String,

    /// Failure policy: `continue` or `abort`. Overrides `[config].policy`.
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<FailurePolicy>,

    /// What to do with running tasks on abort: `wait` or `kill`.
    /// Overrides `[config].in_flight`.
    #[arg(long, value_name = "BEHAVIOUR")]
    pub in_flight: Option<InFlightPolicy>,

    /// Maximum number of tasks to run at once within a level.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_parallel: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the levels, but don't execute any tasks.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the dependency graph in Graphviz DOT format and exit.
    #[arg(long)]
    pub dot: bool,
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
