// src/task.rs

//! The `Task` value type.
//!
//! A task is a script location plus the environment (interpreter/runtime)
//! used to run it. Identity is structural: two tasks with the same
//! `(location, environment)` are the same task, wherever they came from.

use std::fmt;
use std::path::Path;

use crate::errors::{Result, RundagError};

/// Environment used when none is given.
pub const DEFAULT_ENVIRONMENT: &str = "python";

/// Placeholder replaced by a task name inside a [`CommonTask`] template.
const TEMPLATE_PLACEHOLDER: &str = "{}";

/// Explicit identity key of a [`Task`].
///
/// Equality, hashing and ordering of tasks all go through this tuple.
pub type TaskKey<'a> = (&'a str, &'a str);

/// One unit of work: run `environment location` as an external process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Task {
    // Field order matters: the derived `Ord` sorts by location first.
    location: String,
    environment: String,
}

impl Task {
    /// Create a task that runs with the default environment (`python`).
    pub fn new(location: impl Into<String>) -> Result<Self> {
        Self::with_environment(location, DEFAULT_ENVIRONMENT)
    }

    /// Create a task with an explicit environment.
    ///
    /// Fails with [`RundagError::Validation`] if either argument is empty.
    pub fn with_environment(
        location: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self> {
        let location = location.into();
        let environment = environment.into();

        if location.trim().is_empty() {
            return Err(RundagError::Validation(
                "task location cannot be an empty string".to_string(),
            ));
        }
        if environment.trim().is_empty() {
            return Err(RundagError::Validation(format!(
                "environment for task '{location}' cannot be an empty string"
            )));
        }

        Ok(Self {
            location,
            environment,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The identity key used for equality and as a map key.
    pub fn key(&self) -> TaskKey<'_> {
        (self.location.as_str(), self.environment.as_str())
    }

    /// Short, human-friendly name: the file name of the location.
    pub fn name(&self) -> &str {
        Path::new(&self.location)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.location)
    }

    /// The command line this task runs, as it would be typed in a shell.
    pub fn command_line(&self) -> String {
        format!("{} {}", self.environment, self.location)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.name())
    }
}

/// Builds many tasks that share a parent location and an environment.
///
/// ```
/// use rundag::task::CommonTask;
///
/// let tea = CommonTask::new("./tea-tasks/{}", "python").unwrap();
/// let boil = tea.task("boil_water.py").unwrap();
/// assert_eq!(boil.location(), "./tea-tasks/boil_water.py");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonTask {
    template: String,
    environment: String,
}

impl CommonTask {
    /// `template` must contain a `{}` placeholder.
    pub fn new(template: impl Into<String>, environment: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let environment = environment.into();

        if template.trim().is_empty() {
            return Err(RundagError::Validation(
                "common task template cannot be an empty string".to_string(),
            ));
        }
        if !template.contains(TEMPLATE_PLACEHOLDER) {
            return Err(RundagError::Validation(format!(
                "common task template '{template}' must contain a '{TEMPLATE_PLACEHOLDER}' placeholder"
            )));
        }
        if environment.trim().is_empty() {
            return Err(RundagError::Validation(
                "common task environment cannot be an empty string".to_string(),
            ));
        }

        Ok(Self {
            template,
            environment,
        })
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Expand the template for `name` without building a task.
    pub fn location_for(&self, name: &str) -> String {
        self.template.replacen(TEMPLATE_PLACEHOLDER, name, 1)
    }

    /// Build the task for `name`.
    pub fn task(&self, name: &str) -> Result<Task> {
        if name.trim().is_empty() {
            return Err(RundagError::Validation(format!(
                "task name for template '{}' cannot be an empty string",
                self.template
            )));
        }
        Task::with_environment(self.location_for(name), self.environment.clone())
    }
}
