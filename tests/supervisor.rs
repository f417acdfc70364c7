// tests/supervisor.rs
#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_tracing, with_timeout, ScriptDir};
use cronherd::exec::{Supervisor, SupervisorOptions};
use cronherd::model::{TaskDefinition, Trigger};
use cronherd::publish::{OutputKind, RecordingPublisher};
use cronherd::store::{MemoryStore, TaskStore};
use cronherd::types::{ExecutionStatus, TriggerKind};

fn supervisor() -> (Supervisor, Arc<MemoryStore>, Arc<RecordingPublisher>) {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let supervisor = Supervisor::new(
        store.clone(),
        publisher.clone(),
        SupervisorOptions {
            drain_grace: Duration::from_millis(500),
        },
    );
    (supervisor, store, publisher)
}

#[tokio::test]
async fn successful_run_captures_both_streams_in_order() {
    init_tracing();
    let dir = ScriptDir::new();
    let task = TaskDefinition::new(
        "hello",
        dir.script_str("hello.sh", "echo a\necho oops 1>&2\nsleep 0.2\necho b"),
        "0 0 * * * *",
    );
    let (supervisor, store, publisher) = supervisor();

    let exec = with_timeout(supervisor.supervise(&task, Trigger::manual(Some("alice".into())))).await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    assert_eq!(exec.exit_code, Some(0));
    assert_eq!(exec.stdout, "a\nb\n");
    assert_eq!(exec.stderr, "oops\n");
    assert_eq!(exec.error_message, None);
    assert_eq!(exec.trigger, TriggerKind::Manual);
    assert_eq!(exec.triggered_by.as_deref(), Some("alice"));
    assert!(exec.end_time.is_some());
    assert!(exec.elapsed_ms.is_some());

    // The stored record is the finalized one.
    assert_eq!(store.find_execution(exec.id).unwrap(), exec);

    let events = publisher.events_for(exec.id);
    assert_eq!(events.first().unwrap().kind, OutputKind::Start);
    assert_eq!(events.first().unwrap().content, "Starting task execution...");
    let last = events.last().unwrap();
    assert_eq!(last.kind, OutputKind::End);
    assert_eq!(last.content, "Task completed with status: SUCCESS");

    let stdout: Vec<_> = events
        .iter()
        .filter(|e| e.kind == OutputKind::Stdout)
        .map(|e| e.content.as_str())
        .collect();
    assert_eq!(stdout, vec!["a", "b"]);
    let stderr: Vec<_> = events
        .iter()
        .filter(|e| e.kind == OutputKind::Stderr)
        .map(|e| e.content.as_str())
        .collect();
    assert_eq!(stderr, vec!["oops"]);
}

#[tokio::test]
async fn non_zero_exit_is_failed_without_error_message() {
    init_tracing();
    let dir = ScriptDir::new();
    let task = TaskDefinition::new(
        "fails",
        dir.script_str("fails.sh", "echo partial\nexit 7"),
        "0 0 * * * *",
    );
    let (supervisor, _store, publisher) = supervisor();

    let exec = with_timeout(supervisor.supervise(&task, Trigger::scheduled())).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(exec.exit_code, Some(7));
    assert_eq!(exec.stdout, "partial\n");
    assert_eq!(exec.error_message, None);
    assert_eq!(
        publisher.events_for(exec.id).last().unwrap().content,
        "Task completed with status: FAILED"
    );
}

#[tokio::test]
async fn timeout_kills_process_and_reports_timeout() {
    init_tracing();
    let dir = ScriptDir::new();
    let task = TaskDefinition::new(
        "slow",
        dir.script_str("slow.sh", "echo started\nexec sleep 30"),
        "0 0 * * * *",
    )
    .with_timeout_seconds(1);
    let (supervisor, _store, publisher) = supervisor();

    let exec = with_timeout(supervisor.supervise(&task, Trigger::scheduled())).await;

    assert_eq!(exec.status, ExecutionStatus::Timeout);
    assert_eq!(exec.exit_code, None);
    assert_eq!(exec.error_message, None);
    assert!(exec.elapsed_ms.unwrap() >= 1000);
    assert!(exec.elapsed_ms.unwrap() < 4000, "{:?}", exec.elapsed_ms);

    let events = publisher.events_for(exec.id);
    assert!(events
        .iter()
        .any(|e| e.kind == OutputKind::Error && e.content == "Task timeout after 1 seconds"));
    assert_eq!(
        events.last().unwrap().content,
        "Task completed with status: TIMEOUT"
    );
}

#[tokio::test]
async fn task_env_overrides_inherited_environment() {
    init_tracing();
    let dir = ScriptDir::new();
    let task = TaskDefinition::new(
        "env",
        dir.script_str("env.sh", "test -n \"$PATH\" && echo \"$GREETING\""),
        "0 0 * * * *",
    )
    .with_env("GREETING", "hello");
    let (supervisor, _store, _publisher) = supervisor();

    let exec = with_timeout(supervisor.supervise(&task, Trigger::scheduled())).await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    assert_eq!(exec.stdout, "hello\n");
}

#[tokio::test]
async fn missing_script_fails_through_the_shell() {
    init_tracing();
    let dir = ScriptDir::new();
    let missing = dir.marker("does-not-exist.sh");
    let task = TaskDefinition::new("ghost", missing.to_string_lossy(), "0 0 * * * *");
    let (supervisor, _store, _publisher) = supervisor();

    let exec = with_timeout(supervisor.supervise(&task, Trigger::scheduled())).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(exec.exit_code, Some(127));
    assert!(!exec.stderr.is_empty());
}

#[tokio::test]
async fn overlapping_runs_of_one_task_get_separate_records() {
    init_tracing();
    let dir = ScriptDir::new();
    let task = TaskDefinition::new(
        "overlap",
        dir.script_str("overlap.sh", "sleep 0.3\necho done"),
        "0 0 * * * *",
    );
    let (supervisor, store, _publisher) = supervisor();

    let (a, b) = with_timeout(async {
        tokio::join!(
            supervisor.supervise(&task, Trigger::scheduled()),
            supervisor.supervise(&task, Trigger::scheduled())
        )
    })
    .await;

    assert_ne!(a.id, b.id);
    assert_eq!(a.status, ExecutionStatus::Success);
    assert_eq!(b.status, ExecutionStatus::Success);
    assert_eq!(store.list_executions("overlap").unwrap().len(), 2);
    assert!(store.running_executions("overlap").unwrap().is_empty());
}

#[tokio::test]
async fn process_that_cannot_start_is_failed_with_error_message() {
    init_tracing();
    let dir = ScriptDir::new();
    // The shell itself is looked up on the task's PATH.
    let task = TaskDefinition::new("nopath", dir.script_str("nopath.sh", "true"), "0 0 * * * *")
        .with_env("PATH", "/nonexistent");
    let (supervisor, store, publisher) = supervisor();

    let exec = with_timeout(supervisor.supervise(&task, Trigger::scheduled())).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(exec.exit_code, None);
    let message = exec.error_message.clone().expect("error message recorded");
    assert!(!message.is_empty());
    assert!(exec.end_time.is_some());
    assert_eq!(store.find_execution(exec.id).unwrap(), exec);

    let events = publisher.events_for(exec.id);
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![OutputKind::Start, OutputKind::Error, OutputKind::End]);
    assert_eq!(events[1].content, format!("Execution failed: {message}"));
    assert_eq!(events[2].content, "Task completed with status: FAILED");
}
