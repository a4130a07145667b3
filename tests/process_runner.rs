// tests/process_runner.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use rundag::dag::{Scheduler, TaskFailure, TaskState};
use rundag::exec::ProcessRunner;
use rundag::{DependencyGraph, FailurePolicy, InFlightPolicy, RunOptions, RundagError, Task};

type TestResult = Result<(), Box<dyn Error>>;

fn sh_task(loc: &str) -> Task {
    Task::with_environment(loc, "sh").unwrap()
}

fn write_script(dir: &Path, name: &str, body: &str) -> Result<(), Box<dyn Error>> {
    fs::write(dir.join(name), body)?;
    Ok(())
}

#[tokio::test]
async fn failing_script_reports_exit_code_and_stderr() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "fail.sh", "echo starting >&2\necho boom >&2\nexit 3\n")?;

    let failing = sh_task("fail.sh");
    let mut graph = DependencyGraph::new();
    graph.add_task(failing.clone());
    let scheduler = Scheduler::with_runner(graph, ProcessRunner::with_current_dir(dir.path()));

    match with_timeout(scheduler.run_task(&failing)).await {
        Err(RundagError::TaskExecution { failure, .. }) => {
            assert_eq!(
                failure,
                TaskFailure::ExitCode {
                    code: 3,
                    stderr: Some("boom".to_string()),
                }
            );
        }
        other => panic!("expected TaskExecution, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn dependent_script_runs_after_its_dependency() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "first.sh", "echo first >> order.log\n")?;
    write_script(dir.path(), "second.sh", "echo second >> order.log\n")?;

    let graph = DependencyGraph::from_dependencies([(sh_task("second.sh"), sh_task("first.sh"))])?;
    let scheduler = Scheduler::with_runner(graph, ProcessRunner::with_current_dir(dir.path()));

    let report = with_timeout(scheduler.run_tasks(FailurePolicy::Abort)).await?;
    assert!(report.is_success());

    let log = fs::read_to_string(dir.path().join("order.log"))?;
    assert_eq!(log, "first\nsecond\n");
    Ok(())
}

#[tokio::test]
async fn kill_policy_terminates_running_sibling_process() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "fail.sh", "exit 1\n")?;
    write_script(dir.path(), "slow.sh", "sleep 1\ntouch marker\n")?;

    let mut graph = DependencyGraph::new();
    graph.add_tasks([sh_task("fail.sh"), sh_task("slow.sh")]);
    let scheduler = Scheduler::with_runner(graph, ProcessRunner::with_current_dir(dir.path()))
        .with_options(RunOptions {
            max_parallel: 2,
            in_flight: InFlightPolicy::Kill,
        });

    let err = with_timeout(scheduler.run_tasks(FailurePolicy::Abort))
        .await
        .unwrap_err();
    let report = err.report().expect("aborted run carries a report");
    assert_ne!(report.state_of(&sh_task("slow.sh")), Some(&TaskState::Succeeded));

    // Well past the point where slow.sh would have created the marker.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!dir.path().join("marker").exists());
    Ok(())
}

#[tokio::test]
async fn unknown_environment_is_a_launch_failure() -> TestResult {
    init_tracing();

    let task = Task::with_environment("x.py", "rundag-no-such-interpreter")?;
    let mut graph = DependencyGraph::new();
    graph.add_task(task.clone());
    let scheduler = Scheduler::with_runner(graph, ProcessRunner::new());

    let report = with_timeout(scheduler.run_tasks(FailurePolicy::Continue)).await?;
    assert!(matches!(
        report.state_of(&task),
        Some(TaskState::Failed(TaskFailure::Launch(_)))
    ));
    Ok(())
}
