// src/dag/mod.rs

//! Dependency graph and level-by-level scheduling.
//!
//! - [`graph`] holds the acyclic graph of tasks.
//! - [`levels`] assigns each task a level without mutating the graph.
//! - [`scheduler`] dispatches levels against a task runner.
//! - [`report`] records what happened to each task in a run.

pub mod graph;
pub mod levels;
pub mod report;
pub mod scheduler;

pub use graph::{DependencyGraph, DependsOn};
pub use levels::{compute_levels, group_by_level, Level};
pub use report::{AbortInfo, ExecutionReport, TaskFailure, TaskOutcome, TaskState};
pub use scheduler::{RunOptions, Scheduler};
