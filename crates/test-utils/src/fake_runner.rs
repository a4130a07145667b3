use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rundag::dag::{TaskFailure, TaskOutcome};
use rundag::exec::{RunFuture, TaskRunner};
use rundag::Task;

/// What the fake runner observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    Started(String),
    Finished(String),
}

/// A fake runner that:
/// - records when each task starts and finishes
/// - fails the tasks it was told to fail (exit code 1)
/// - optionally sleeps per task, so tests can overlap executions
#[derive(Clone, Default)]
pub struct FakeRunner {
    failing: Vec<String>,
    delays: HashMap<String, Duration>,
    events: Arc<Mutex<Vec<RunnerEvent>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the task whose location is `loc`.
    pub fn failing(mut self, loc: &str) -> Self {
        self.failing.push(loc.to_string());
        self
    }

    /// Sleep for `delay` before reporting `loc`'s outcome.
    pub fn delayed(mut self, loc: &str, delay: Duration) -> Self {
        self.delays.insert(loc.to_string(), delay);
        self
    }

    /// Shared handle to the event log; clone it before handing the runner
    /// to a scheduler.
    pub fn events(&self) -> Arc<Mutex<Vec<RunnerEvent>>> {
        Arc::clone(&self.events)
    }

    fn record(&self, event: RunnerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl TaskRunner for FakeRunner {
    fn run<'a>(&'a self, task: &'a Task) -> RunFuture<'a> {
        Box::pin(async move {
            let loc = task.location().to_string();
            self.record(RunnerEvent::Started(loc.clone()));

            if let Some(delay) = self.delays.get(&loc) {
                tokio::time::sleep(*delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            self.record(RunnerEvent::Finished(loc.clone()));

            if self.failing.contains(&loc) {
                TaskOutcome::Failed(TaskFailure::ExitCode {
                    code: 1,
                    stderr: Some(format!("{loc} failed")),
                })
            } else {
                TaskOutcome::Success
            }
        })
    }
}

/// Locations that started, in order.
pub fn started(events: &Arc<Mutex<Vec<RunnerEvent>>>) -> Vec<String> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            RunnerEvent::Started(loc) => Some(loc.clone()),
            RunnerEvent::Finished(_) => None,
        })
        .collect()
}
