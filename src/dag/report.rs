// src/dag/report.rs

//! Per-task results of a scheduler run.

use std::collections::BTreeMap;
use std::fmt;

use crate::dag::levels::Level;
use crate::task::Task;

/// Why a task did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The process exited with a non-zero code.
    ExitCode { code: i32, stderr: Option<String> },
    /// The process was terminated by a signal (no exit code).
    Signal,
    /// The process could not be started.
    Launch(String),
    /// The task was still running when the run aborted and it was killed.
    Terminated,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::ExitCode { code, stderr: Some(line) } => {
                write!(f, "exited with code {code}: {line}")
            }
            TaskFailure::ExitCode { code, stderr: None } => write!(f, "exited with code {code}"),
            TaskFailure::Signal => write!(f, "terminated by signal"),
            TaskFailure::Launch(reason) => write!(f, "failed to launch: {reason}"),
            TaskFailure::Terminated => write!(f, "terminated after the run was aborted"),
        }
    }
}

/// Result reported by a runner for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(TaskFailure),
}

/// Per-run state of a task.
///
/// Tasks move `Pending -> Running -> {Succeeded, Failed}`. A task still
/// `Pending` at the end of a run was never dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed(TaskFailure),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed(_))
    }
}

/// Where and why a run stopped under the `abort` policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortInfo {
    pub task: Task,
    pub level: Level,
    pub unstarted_levels: Vec<Level>,
}

/// Everything a run did, task by task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    levels: BTreeMap<Task, Level>,
    states: BTreeMap<Task, TaskState>,
    aborted: Option<AbortInfo>,
}

impl ExecutionReport {
    /// Start a report with every task `Pending`.
    pub fn new(levels: BTreeMap<Task, Level>) -> Self {
        let states = levels
            .keys()
            .map(|t| (t.clone(), TaskState::Pending))
            .collect();
        Self {
            levels,
            states,
            aborted: None,
        }
    }

    pub(crate) fn set_state(&mut self, task: &Task, state: TaskState) {
        if let Some(current) = self.states.get_mut(task) {
            *current = state;
        }
    }

    pub(crate) fn set_aborted(&mut self, info: AbortInfo) {
        self.aborted = Some(info);
    }

    pub fn state_of(&self, task: &Task) -> Option<&TaskState> {
        self.states.get(task)
    }

    pub fn level_of(&self, task: &Task) -> Option<Level> {
        self.levels.get(task).copied()
    }

    pub fn states(&self) -> impl Iterator<Item = (&Task, &TaskState)> {
        self.states.iter()
    }

    pub fn succeeded(&self) -> Vec<&Task> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s, TaskState::Succeeded))
            .map(|(t, _)| t)
            .collect()
    }

    pub fn failures(&self) -> Vec<(&Task, &TaskFailure)> {
        self.states
            .iter()
            .filter_map(|(t, s)| match s {
                TaskState::Failed(failure) => Some((t, failure)),
                _ => None,
            })
            .collect()
    }

    /// Tasks that were never dispatched.
    pub fn not_started(&self) -> Vec<&Task> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s, TaskState::Pending))
            .map(|(t, _)| t)
            .collect()
    }

    /// Number of tasks that were dispatched.
    pub fn attempted(&self) -> usize {
        self.states.len() - self.not_started().len()
    }

    pub fn aborted(&self) -> Option<&AbortInfo> {
        self.aborted.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.states.values().all(|s| matches!(s, TaskState::Succeeded))
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} succeeded, {} failed, {} not started",
            self.succeeded().len(),
            self.failures().len(),
            self.not_started().len()
        )?;
        for (task, failure) in self.failures() {
            writeln!(f, "  {task} ({}): {failure}", task.command_line())?;
        }
        if let Some(info) = &self.aborted {
            writeln!(
                f,
                "  aborted at level {} by {}; levels never started: {:?}",
                info.level,
                info.task.command_line(),
                info.unstarted_levels
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_report_has_every_task_pending() {
        let a = Task::new("a.py").unwrap();
        let b = Task::new("b.py").unwrap();
        let report = ExecutionReport::new(BTreeMap::from([(a.clone(), 1), (b.clone(), 2)]));

        assert_eq!(report.not_started().len(), 2);
        assert_eq!(report.attempted(), 0);
        assert_eq!(report.level_of(&b), Some(2));
        assert!(!report.is_success());
    }

    #[test]
    fn failures_and_successes_are_listed() {
        let a = Task::new("a.py").unwrap();
        let b = Task::new("b.py").unwrap();
        let mut report = ExecutionReport::new(BTreeMap::from([(a.clone(), 1), (b.clone(), 1)]));
        report.set_state(&a, TaskState::Succeeded);
        report.set_state(&b, TaskState::Failed(TaskFailure::ExitCode { code: 2, stderr: None }));

        assert_eq!(report.succeeded(), vec![&a]);
        assert_eq!(report.failures().len(), 1);
        assert!(report.to_string().contains("Task(b.py) (python b.py): exited with code 2"));
    }
}
