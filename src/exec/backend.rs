// src/exec/backend.rs

//! Pluggable task runner abstraction.
//!
//! The scheduler talks to a `TaskRunner` instead of spawning processes
//! itself. Production code uses [`ProcessRunner`](super::ProcessRunner);
//! tests provide runners that record calls and return scripted outcomes
//! without touching the OS.

use std::future::Future;
use std::pin::Pin;

use crate::dag::report::TaskOutcome;
use crate::task::Task;

/// Boxed future returned by [`TaskRunner::run`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>>;

/// Trait abstracting how a single task is executed.
///
/// Implementations must resolve once the task has finished. Dropping the
/// returned future before it resolves must stop the work (for processes:
/// kill the child); the scheduler relies on this when it terminates
/// in-flight tasks after an abort.
pub trait TaskRunner: Send + Sync + 'static {
    fn run<'a>(&'a self, task: &'a Task) -> RunFuture<'a>;
}
