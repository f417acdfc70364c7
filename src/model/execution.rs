// src/model/execution.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Actor, TaskId};
use crate::types::{ExecutionStatus, TriggerKind};

pub type ExecutionId = Uuid;

/// Who or what started an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub actor: Option<Actor>,
    /// Only set for `TriggerKind::Dependency`.
    pub parent: Option<ExecutionId>,
}

impl Trigger {
    pub fn scheduled() -> Self {
        Self {
            kind: TriggerKind::Scheduled,
            actor: None,
            parent: None,
        }
    }

    pub fn manual(actor: Option<Actor>) -> Self {
        Self {
            kind: TriggerKind::Manual,
            actor,
            parent: None,
        }
    }

    /// Trigger for a dependent of `parent`.
    ///
    /// The actor is inherited from the parent, which itself inherited it, so
    /// it always names whoever started the top of the chain.
    pub fn dependency_of(parent: &TaskExecution) -> Self {
        Self {
            kind: TriggerKind::Dependency,
            actor: parent.triggered_by.clone(),
            parent: Some(parent.id),
        }
    }
}

/// One supervised run of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: ExecutionId,
    pub task_id: TaskId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    /// Absent unless the process exited on its own.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Set only when supervision itself failed (spawn error, I/O error).
    pub error_message: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub trigger: TriggerKind,
    pub triggered_by: Option<Actor>,
    pub parent_execution: Option<ExecutionId>,
}

impl TaskExecution {
    /// New execution in `RUNNING`, started now.
    pub fn begin(task_id: impl Into<TaskId>, trigger: &Trigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            start_time: Utc::now(),
            end_time: None,
            status: ExecutionStatus::Running,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error_message: None,
            elapsed_ms: None,
            trigger: trigger.kind,
            triggered_by: trigger.actor.clone(),
            parent_execution: trigger.parent,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a terminal status. Ignored once a terminal status is set.
    pub fn set_status(&mut self, status: ExecutionStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    /// Record process exit: SUCCESS on 0, FAILED otherwise.
    pub fn record_exit(&mut self, code: i32) {
        if self.is_finished() {
            return;
        }
        self.exit_code = Some(code);
        let status = if code == 0 {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        self.set_status(status);
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        if self.set_status(ExecutionStatus::Failed) {
            self.error_message = Some(message.into());
        }
    }

    /// Stamp end time and elapsed milliseconds. Only the first call counts.
    pub fn finalize(&mut self) {
        if self.end_time.is_some() {
            return;
        }
        let end = Utc::now();
        let elapsed = (end - self.start_time).num_milliseconds().max(0) as u64;
        self.end_time = Some(end);
        self.elapsed_ms = Some(elapsed);
    }
}
