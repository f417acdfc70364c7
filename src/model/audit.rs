// src/model/audit.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Actor, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Scheduled,
    Cancelled,
    ManualExecution,
    DependencyTriggered,
    DependenciesUpdated,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::Scheduled => "SCHEDULED",
            AuditAction::Cancelled => "CANCELLED",
            AuditAction::ManualExecution => "MANUAL_EXECUTION",
            AuditAction::DependencyTriggered => "DEPENDENCY_TRIGGERED",
            AuditAction::DependenciesUpdated => "DEPENDENCIES_UPDATED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub task_id: TaskId,
    pub actor: Option<Actor>,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        task_id: impl Into<TaskId>,
        actor: Option<&str>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            action,
            task_id: task_id.into(),
            actor: actor.map(str::to_string),
            timestamp: Utc::now(),
            details: details.into(),
        }
    }
}
