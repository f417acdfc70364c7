// src/dag/cascade.rs

//! Dependency cascade: after a successful execution, submit each enabled
//! dependent with lineage pointing back at the parent.

use tracing::{debug, info, warn};

use crate::audit::{record_or_log, AuditSink};
use crate::errors::Result;
use crate::model::{AuditAction, AuditRecord, TaskDefinition, TaskExecution, TaskId, Trigger};
use crate::store::TaskStore;
use crate::types::ExecutionStatus;

/// Something that can queue an execution without waiting for it.
///
/// The production implementation lives in `exec::executor`; tests use a
/// recording fake.
pub trait ExecutionSubmitter: Send + Sync {
    fn submit(&self, task: TaskDefinition, trigger: Trigger) -> Result<()>;
}

/// Submit every enabled dependent of `parent_task` after `parent` succeeded.
///
/// - Does nothing unless `parent.status` is SUCCESS.
/// - Unknown and disabled dependents are skipped.
/// - Each dependent is handled independently; one failing lookup or submit
///   does not stop the others.
///
/// There is no cycle guard: a task that (transitively) depends on itself
/// keeps re-triggering for as long as its runs succeed.
///
/// Returns the ids that were submitted.
pub fn trigger_dependents(
    store: &dyn TaskStore,
    audit: &dyn AuditSink,
    submitter: &dyn ExecutionSubmitter,
    parent_task: &TaskDefinition,
    parent: &TaskExecution,
) -> Vec<TaskId> {
    if parent.status != ExecutionStatus::Success {
        debug!(
            task = %parent.task_id,
            status = %parent.status,
            "not triggering dependents of unsuccessful execution"
        );
        return Vec::new();
    }

    let mut triggered = Vec::new();

    for dependent_id in parent_task.dependents.iter() {
        let dependent = match store.find_definition(dependent_id) {
            Ok(def) => def,
            Err(e) if e.is_not_found() => {
                debug!(parent = %parent.task_id, dependent = %dependent_id, "dependent not found; skipping");
                continue;
            }
            Err(e) => {
                warn!(parent = %parent.task_id, dependent = %dependent_id, error = %e, "failed to load dependent");
                continue;
            }
        };

        if !dependent.enabled {
            debug!(parent = %parent.task_id, dependent = %dependent_id, "dependent disabled; skipping");
            continue;
        }

        record_or_log(
            audit,
            AuditRecord::new(
                AuditAction::DependencyTriggered,
                dependent_id.as_str(),
                parent.triggered_by.as_deref(),
                format!(
                    "Triggered by successful completion of {}",
                    parent.task_id
                ),
            ),
        );

        match submitter.submit(dependent, Trigger::dependency_of(parent)) {
            Ok(()) => {
                info!(
                    parent = %parent.task_id,
                    parent_execution = %parent.id,
                    dependent = %dependent_id,
                    "triggered dependent task"
                );
                triggered.push(dependent_id.clone());
            }
            Err(e) => {
                warn!(parent = %parent.task_id, dependent = %dependent_id, error = %e, "failed to trigger dependent");
            }
        }
    }

    triggered
}
