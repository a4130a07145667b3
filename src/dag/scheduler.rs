// src/dag/scheduler.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::levels::{compute_levels, group_by_level, Level};
use crate::dag::report::{AbortInfo, ExecutionReport, TaskFailure, TaskOutcome, TaskState};
use crate::errors::{Result, RundagError};
use crate::exec::{ProcessRunner, TaskRunner};
use crate::task::Task;
use crate::types::{FailurePolicy, InFlightPolicy};

/// Knobs for how a run dispatches tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of tasks running at once within a level.
    pub max_parallel: usize,
    /// Fate of running siblings when the run aborts.
    pub in_flight: InFlightPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_parallel: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            in_flight: InFlightPolicy::default(),
        }
    }
}

/// Messages from per-task workers to the level collector.
#[derive(Debug)]
enum LevelEvent {
    Started(Task),
    Finished(Task, TaskOutcome),
}

/// Scheduler holds an immutable dependency graph and runs it level by level.
///
/// It is responsible for:
/// - assigning each task a level (see [`compute_levels`])
/// - dispatching every task of a level, concurrently up to
///   [`RunOptions::max_parallel`], and waiting for the whole level before
///   starting the next one
/// - applying the [`FailurePolicy`] when a task fails
///
/// Level computation only borrows the graph, so repeated calls always see the
/// graph exactly as it was supplied.
pub struct Scheduler {
    graph: DependencyGraph,
    runner: Arc<dyn TaskRunner>,
    options: RunOptions,
}

impl Scheduler {
    /// Scheduler that runs tasks as real processes.
    pub fn new(graph: DependencyGraph) -> Self {
        Self::with_runner(graph, ProcessRunner::new())
    }

    /// Scheduler that dispatches through the given runner.
    pub fn with_runner(graph: DependencyGraph, runner: impl TaskRunner) -> Self {
        Self {
            graph,
            runner: Arc::new(runner),
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Task → level. Idempotent.
    pub fn compute_levels(&self) -> BTreeMap<Task, Level> {
        compute_levels(&self.graph)
    }

    /// Level → tasks on that level.
    pub fn levels(&self) -> BTreeMap<Level, BTreeSet<Task>> {
        group_by_level(&self.compute_levels())
    }

    /// Run a single task and wait for it.
    pub async fn run_task(&self, task: &Task) -> Result<()> {
        if !self.graph.contains(task) {
            return Err(RundagError::Membership(task.command_line()));
        }

        match self.runner.run(task).await {
            TaskOutcome::Success => Ok(()),
            TaskOutcome::Failed(failure) => Err(RundagError::TaskExecution {
                task: task.command_line(),
                failure,
            }),
        }
    }

    /// Run every task, level by level.
    ///
    /// Under [`FailurePolicy::Continue`] every task is attempted and the
    /// report lists all failures. Under [`FailurePolicy::Abort`] the first
    /// failure stops dispatch and is returned as
    /// [`RundagError::EarlyAbort`], which carries the report.
    pub async fn run_tasks(&self, policy: FailurePolicy) -> Result<ExecutionReport> {
        let levels = self.compute_levels();
        let grouped = group_by_level(&levels);
        let mut report = ExecutionReport::new(levels);

        info!(
            tasks = self.graph.len(),
            levels = grouped.len(),
            ?policy,
            max_parallel = self.options.max_parallel,
            "starting run"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.max_parallel.max(1)));
        let abort_tx = Arc::new(watch::Sender::new(false));

        for (&level, tasks) in &grouped {
            info!(level, tasks = tasks.len(), "starting level");

            let failed = self
                .run_level(tasks, policy, &semaphore, &abort_tx, &mut report)
                .await;

            if let Some(task) = failed {
                let unstarted_levels: Vec<Level> =
                    grouped.range(level + 1..).map(|(&l, _)| l).collect();

                warn!(
                    task = %task,
                    level,
                    ?unstarted_levels,
                    "run aborted; no further tasks will be dispatched"
                );

                report.set_aborted(AbortInfo {
                    task: task.clone(),
                    level,
                    unstarted_levels: unstarted_levels.clone(),
                });

                return Err(RundagError::EarlyAbort {
                    task: task.command_line(),
                    level,
                    unstarted_levels,
                    report: Box::new(report),
                });
            }
        }

        info!(
            succeeded = report.succeeded().len(),
            failed = report.failures().len(),
            "run finished"
        );
        Ok(report)
    }

    /// Dispatch one level and wait until every task in it is resolved.
    ///
    /// Returns the task that triggered an abort, if any. Workers live in a
    /// `JoinSet` owned by this future: dropping it (a cancelled run, Ctrl-C)
    /// aborts them, and a runner's child process goes with its worker.
    async fn run_level(
        &self,
        tasks: &BTreeSet<Task>,
        policy: FailurePolicy,
        semaphore: &Arc<Semaphore>,
        abort_tx: &Arc<watch::Sender<bool>>,
        report: &mut ExecutionReport,
    ) -> Option<Task> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<LevelEvent>();
        let kill_in_flight = self.options.in_flight == InFlightPolicy::Kill;
        let mut workers = JoinSet::new();

        for task in tasks {
            let task = task.clone();
            let runner = Arc::clone(&self.runner);
            let semaphore = Arc::clone(semaphore);
            let abort_tx = Arc::clone(abort_tx);
            let event_tx = event_tx.clone();

            workers.spawn(async move {
                let mut abort_rx = abort_tx.subscribe();

                let _permit = tokio::select! {
                    biased;
                    _ = abort_raised(&mut abort_rx) => {
                        debug!(task = %task, "run aborted before task started; skipping");
                        return;
                    }
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                let _ = event_tx.send(LevelEvent::Started(task.clone()));

                let outcome = if kill_in_flight {
                    tokio::select! {
                        outcome = runner.run(&task) => outcome,
                        _ = abort_raised(&mut abort_rx) => {
                            info!(task = %task, "run aborted; terminating running task");
                            TaskOutcome::Failed(TaskFailure::Terminated)
                        }
                    }
                } else {
                    runner.run(&task).await
                };

                // Raise the abort before releasing the permit, so no queued
                // sibling can start in between.
                if policy == FailurePolicy::Abort && matches!(outcome, TaskOutcome::Failed(_)) {
                    abort_tx.send_replace(true);
                }

                let _ = event_tx.send(LevelEvent::Finished(task, outcome));
            });
        }

        // The collector is the only writer to the report; the loop ends once
        // every worker has dropped its sender.
        drop(event_tx);

        let mut abort_cause = None;
        while let Some(event) = event_rx.recv().await {
            match event {
                LevelEvent::Started(task) => {
                    debug!(task = %task, "task running");
                    report.set_state(&task, TaskState::Running);
                }
                LevelEvent::Finished(task, TaskOutcome::Success) => {
                    info!(task = %task, "task succeeded");
                    report.set_state(&task, TaskState::Succeeded);
                }
                LevelEvent::Finished(task, TaskOutcome::Failed(failure)) => {
                    warn!(task = %task, %failure, "task failed");
                    if policy == FailurePolicy::Abort
                        && abort_cause.is_none()
                        && failure != TaskFailure::Terminated
                    {
                        abort_cause = Some(task.clone());
                    }
                    report.set_state(&task, TaskState::Failed(failure));
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "task worker did not complete");
            }
        }

        abort_cause
    }
}

/// Resolves once the abort flag is set. Never resolves if the sender is gone.
async fn abort_raised(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|aborted| *aborted).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scheduler({})", self.graph)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("graph", &self.graph)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
