// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::dag::graph::DependencyGraph;
use crate::dag::scheduler::RunOptions;
use crate::task::Task;
use crate::types::{FailurePolicy, InFlightPolicy};

/// Top-level schedule file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// policy = "abort"
/// in_flight = "wait"
/// max_parallel = 2
///
/// [default]
/// env = "python3"
/// loc_template = "tea-tasks/{}"
///
/// [task.boil_water]
/// loc = "boil_water.py"
/// after = ["pour_water"]
///
/// [task.pour_water]
/// loc = "pour_water.py"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Run behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Defaults shared by all tasks from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// `"continue"` (default) or `"abort"`.
    #[serde(default)]
    pub policy: FailurePolicy,

    /// `"wait"` (default) or `"kill"`: what happens to tasks still running
    /// when the run aborts.
    #[serde(default)]
    pub in_flight: InFlightPolicy,

    /// Maximum number of tasks running at once within a level.
    ///
    /// If `None`, the available parallelism of the machine is used.
    #[serde(default)]
    pub max_parallel: Option<usize>,
}

/// `[default]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    /// Environment for tasks that do not set `env`. Falls back to `python`.
    #[serde(default)]
    pub env: Option<String>,

    /// Template with a `{}` placeholder applied to every task's `loc`.
    #[serde(default)]
    pub loc_template: Option<String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Script location (or the part substituted into `loc_template`).
    pub loc: String,

    /// Task-local environment; overrides `default.env`.
    #[serde(default)]
    pub env: Option<String>,

    /// Names of the tasks this one runs after.
    #[serde(default)]
    pub after: Vec<String>,
}

/// A validated schedule file.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holding one means every task resolved and the dependencies form a DAG.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub task: BTreeMap<String, TaskConfig>,
    tasks: BTreeMap<String, Task>,
    graph: DependencyGraph,
}

impl ConfigFile {
    pub(crate) fn new_validated(
        raw: RawConfigFile,
        tasks: BTreeMap<String, Task>,
        graph: DependencyGraph,
    ) -> Self {
        Self {
            config: raw.config,
            default: raw.default,
            task: raw.task,
            tasks,
            graph,
        }
    }

    /// The dependency graph declared by this file.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// The resolved task for a `[task.<name>]` entry.
    pub fn task_named(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Scheduler options from `[config]`.
    pub fn run_options(&self) -> RunOptions {
        let mut options = RunOptions {
            in_flight: self.config.in_flight,
            ..RunOptions::default()
        };
        if let Some(n) = self.config.max_parallel {
            options.max_parallel = n;
        }
        options
    }
}
