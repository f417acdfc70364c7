// tests/cascade.rs
#![cfg(unix)]

mod common;

use common::yearly_task as task;
use common::{init_tracing, with_timeout, Harness, ScriptDir};
use cronherd::model::AuditAction;
use cronherd::store::TaskStore;
use cronherd::types::{ExecutionStatus, TriggerKind};

#[tokio::test]
async fn success_triggers_enabled_dependents_with_lineage() {
    init_tracing();
    let dir = ScriptDir::new();
    let h = Harness::new();

    h.store
        .save_definition(
            &task(&dir, "A", "echo A")
                .with_dependent("B")
                .with_dependent("C")
                .with_dependent("missing"),
        )
        .unwrap();
    h.store.save_definition(&task(&dir, "B", "echo B")).unwrap();
    h.store
        .save_definition(&task(&dir, "C", "echo C").disabled())
        .unwrap();

    let parent = with_timeout(async {
        let exec = h.scheduler.execute_manually("A", Some("alice")).await.unwrap();
        h.scheduler.wait_idle().await;
        exec
    })
    .await;

    assert_eq!(parent.status, ExecutionStatus::Success);
    assert_eq!(parent.trigger, TriggerKind::Manual);

    let b_runs = h.finished("B");
    assert_eq!(b_runs.len(), 1);
    let b = &b_runs[0];
    assert_eq!(b.status, ExecutionStatus::Success);
    assert_eq!(b.trigger, TriggerKind::Dependency);
    assert_eq!(b.parent_execution, Some(parent.id));
    assert_eq!(b.triggered_by.as_deref(), Some("alice"));

    assert!(h.finished("C").is_empty());

    assert_eq!(h.audit.count(AuditAction::ManualExecution, "A"), 1);
    assert_eq!(h.audit.count(AuditAction::DependencyTriggered, "B"), 1);
    assert_eq!(h.audit.count(AuditAction::DependencyTriggered, "C"), 0);
    let record = &h.audit.for_task("B")[0];
    assert_eq!(record.actor.as_deref(), Some("alice"));
    assert_eq!(record.details, "Triggered by successful completion of A");
}

#[tokio::test]
async fn failed_or_timed_out_parent_triggers_nothing() {
    init_tracing();
    let dir = ScriptDir::new();
    let h = Harness::new();

    h.store
        .save_definition(&task(&dir, "fails", "exit 3").with_dependent("B"))
        .unwrap();
    h.store
        .save_definition(
            &task(&dir, "slow", "exec sleep 30")
                .with_timeout_seconds(1)
                .with_dependent("B"),
        )
        .unwrap();
    h.store.save_definition(&task(&dir, "B", "echo B")).unwrap();

    let (failed, timed_out) = with_timeout(async {
        let failed = h.scheduler.execute_manually("fails", None).await.unwrap();
        let timed_out = h.scheduler.execute_manually("slow", None).await.unwrap();
        h.scheduler.wait_idle().await;
        (failed, timed_out)
    })
    .await;

    assert_eq!(failed.status, ExecutionStatus::Failed);
    assert_eq!(timed_out.status, ExecutionStatus::Timeout);
    assert!(h.finished("B").is_empty());
    assert_eq!(h.audit.count(AuditAction::DependencyTriggered, "B"), 0);
}

#[tokio::test]
async fn actor_propagates_down_a_chain() {
    init_tracing();
    let dir = ScriptDir::new();
    let h = Harness::new();

    h.store
        .save_definition(&task(&dir, "A", "true").with_dependent("B"))
        .unwrap();
    h.store
        .save_definition(&task(&dir, "B", "true").with_dependent("C"))
        .unwrap();
    h.store.save_definition(&task(&dir, "C", "true")).unwrap();

    let a = with_timeout(async {
        let a = h.scheduler.execute_manually("A", Some("ops")).await.unwrap();
        h.scheduler.wait_idle().await;
        a
    })
    .await;

    let b = h.scheduler.last_execution("B").unwrap();
    let c = h.scheduler.last_execution("C").unwrap();

    assert_eq!(b.parent_execution, Some(a.id));
    assert_eq!(c.parent_execution, Some(b.id));
    assert_eq!(c.trigger, TriggerKind::Dependency);
    assert_eq!(c.triggered_by.as_deref(), Some("ops"));
    assert_eq!(
        h.audit.for_task("C")[0].actor.as_deref(),
        Some("ops"),
        "cascade audit names the original actor"
    );
}

#[tokio::test]
async fn dependents_edited_after_registration_are_used() {
    init_tracing();
    let dir = ScriptDir::new();
    let h = Harness::new();

    h.store.save_definition(&task(&dir, "A", "true")).unwrap();
    h.store.save_definition(&task(&dir, "B", "true")).unwrap();

    let kept = h
        .scheduler
        .update_dependents("A", ["B".to_string(), "A".to_string(), "nope".to_string()], Some("bob"))
        .unwrap();
    assert_eq!(kept.into_iter().collect::<Vec<_>>(), vec!["B".to_string()]);

    let stored = h.scheduler.find_definition("A").unwrap();
    assert_eq!(stored.modified_by.as_deref(), Some("bob"));
    assert_eq!(h.audit.count(AuditAction::DependenciesUpdated, "A"), 1);
    assert_eq!(h.audit.for_task("A")[0].details, "Dependencies updated: B");

    with_timeout(async {
        h.scheduler.execute_manually("A", None).await.unwrap();
        h.scheduler.wait_idle().await;
    })
    .await;

    assert_eq!(h.finished("B").len(), 1);

    h.scheduler
        .update_dependents("A", Vec::<String>::new(), Some("bob"))
        .unwrap();
    assert_eq!(h.audit.for_task("A")[0].details, "Dependencies updated: none");
}

#[tokio::test]
async fn manual_execution_of_unknown_task_is_not_found() {
    init_tracing();
    let h = Harness::new();

    let err = h.scheduler.execute_manually("nope", Some("alice")).await.unwrap_err();

    assert!(err.is_not_found());
    assert!(h.audit.records().is_empty());
}
