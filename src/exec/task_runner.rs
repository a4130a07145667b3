// src/exec/task_runner.rs

//! Individual task process runner.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::dag::report::{TaskFailure, TaskOutcome};
use crate::exec::backend::{RunFuture, TaskRunner};
use crate::task::Task;

/// Runs `environment location` as a child process.
///
/// The environment is used verbatim as the program and the location is its
/// only argument; no shell is involved. Stdout is inherited so task output
/// reaches the terminal, stderr is captured and logged at debug level. The
/// child is killed if the run future is dropped.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    current_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every process from `dir` so relative locations resolve there.
    pub fn with_current_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: Some(dir.into()),
        }
    }
}

impl TaskRunner for ProcessRunner {
    fn run<'a>(&'a self, task: &'a Task) -> RunFuture<'a> {
        Box::pin(async move {
            match self.run_process(task).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(task = %task, error = %err, "failed to launch task process");
                    TaskOutcome::Failed(TaskFailure::Launch(err.to_string()))
                }
            }
        })
    }
}

impl ProcessRunner {
    async fn run_process(&self, task: &Task) -> std::io::Result<TaskOutcome> {
        info!(task = %task, cmd = %task.command_line(), "starting task process");

        let mut cmd = Command::new(task.environment());
        cmd.arg(task.location())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;

        // Always consume stderr so the pipe never fills; keep the last line
        // for the failure message.
        let stderr_reader = child.stderr.take().map(|stderr| {
            let task_name = task.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut last = None;
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %task_name, "stderr: {}", line);
                    if !line.trim().is_empty() {
                        last = Some(line);
                    }
                }
                last
            })
        });

        let status = child.wait().await?;

        let last_stderr = match stderr_reader {
            Some(handle) => handle.await.ok().flatten(),
            None => None,
        };

        info!(
            task = %task,
            exit_code = status.code(),
            success = status.success(),
            "task process exited"
        );

        let outcome = if status.success() {
            TaskOutcome::Success
        } else {
            match status.code() {
                Some(code) => TaskOutcome::Failed(TaskFailure::ExitCode {
                    code,
                    stderr: last_stderr,
                }),
                None => TaskOutcome::Failed(TaskFailure::Signal),
            }
        };

        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_exit_is_success() {
        let task = Task::with_environment("ignored", "true").unwrap();
        assert_eq!(ProcessRunner::new().run(&task).await, TaskOutcome::Success);
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let task = Task::with_environment("ignored", "false").unwrap();
        assert!(matches!(
            ProcessRunner::new().run(&task).await,
            TaskOutcome::Failed(TaskFailure::ExitCode { code: 1, .. })
        ));
    }

    #[tokio::test]
    async fn missing_program_is_launch_failure() {
        let task = Task::with_environment("x.py", "rundag-no-such-interpreter").unwrap();
        assert!(matches!(
            ProcessRunner::new().run(&task).await,
            TaskOutcome::Failed(TaskFailure::Launch(_))
        ));
    }
}
