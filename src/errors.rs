// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::dag::report::{ExecutionReport, TaskFailure};

#[derive(Error, Debug)]
pub enum RundagError {
    /// Malformed task or graph construction arguments.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Inserting `depends_on -> task` would close a cycle. The graph was left
    /// unchanged.
    ///
    /// Tasks in error variants are named by their command line, which is
    /// unique per task.
    #[error("Adding the dependency `{depends_on}` -> `{task}` introduced a cycle")]
    CyclicDependency { task: String, depends_on: String },

    /// An operation referenced a task that is not in the graph.
    #[error("`{0}` is not in the graph")]
    Membership(String),

    /// The external process for a task failed.
    #[error("Task `{task}` failed: {failure}")]
    TaskExecution { task: String, failure: TaskFailure },

    /// The scheduler stopped dispatching after a failure under the `abort`
    /// policy.
    #[error(
        "Run aborted: `{task}` failed at level {level}; levels never started: {unstarted_levels:?}"
    )]
    EarlyAbort {
        task: String,
        level: u32,
        unstarted_levels: Vec<u32>,
        report: Box<ExecutionReport>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RundagError {
    /// The execution report attached to an aborted run, if any.
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            RundagError::EarlyAbort { report, .. } => Some(report),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RundagError>;
