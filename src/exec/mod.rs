// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] defines the `TaskRunner` trait the scheduler dispatches
//!   through, so tests can swap in a fake runner.
//! - [`task_runner`] holds `ProcessRunner`, which runs a task as an external
//!   process with `tokio::process::Command`.

pub mod backend;
pub mod task_runner;

pub use backend::{RunFuture, TaskRunner};
pub use task_runner::ProcessRunner;
