// src/model/task.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Actor, TaskId};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 3600;

/// Persisted configuration of a recurring job.
///
/// The scheduler only ever reads snapshots of this: once when a cron
/// registration is installed and again at each fire. A running execution
/// never sees later edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_id: TaskId,

    /// Handed to the platform shell as the command to run.
    pub script_path: String,

    /// Six fields: seconds, minutes, hours, day-of-month, month, day-of-week.
    pub cron_expression: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Overrides merged into the inherited process environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Carried as configuration only; no retry loop consumes it.
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Tasks to run after a successful execution of this one.
    ///
    /// May name this task itself or form a cycle; nothing here checks.
    #[serde(default)]
    pub dependents: BTreeSet<TaskId>,

    #[serde(default)]
    pub created_by: Option<Actor>,
    #[serde(default)]
    pub modified_by: Option<Actor>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl TaskDefinition {
    pub fn new(
        task_id: impl Into<TaskId>,
        script_path: impl Into<String>,
        cron_expression: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            script_path: script_path.into(),
            cron_expression: cron_expression.into(),
            description: None,
            enabled: true,
            env: BTreeMap::new(),
            max_retries: 0,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            dependents: BTreeSet::new(),
            created_by: None,
            modified_by: None,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_dependent(mut self, task_id: impl Into<TaskId>) -> Self {
        self.dependents.insert(task_id.into());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn script(&self) -> &Path {
        Path::new(&self.script_path)
    }

    /// Stamp a modification by `actor`.
    pub fn touch(&mut self, actor: Option<&str>) {
        self.modified_by = actor.map(str::to_string);
        self.last_modified = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_definition_uses_documented_defaults() {
        let def = TaskDefinition::new("a", "/tmp/a.sh", "0 * * * * *");
        assert!(def.enabled);
        assert_eq!(def.timeout_seconds, 3600);
        assert_eq!(def.max_retries, 0);
        assert!(def.dependents.is_empty());
        assert!(def.env.is_empty());
    }

    #[test]
    fn dependents_are_a_set() {
        let def = TaskDefinition::new("a", "/tmp/a.sh", "0 * * * * *")
            .with_dependent("b")
            .with_dependent("b")
            .with_dependent("a");
        assert_eq!(def.dependents.len(), 2);
    }

    #[test]
    fn touch_records_modifier() {
        let mut def = TaskDefinition::new("a", "/tmp/a.sh", "0 * * * * *");
        let before = def.last_modified;
        def.touch(Some("alice"));
        assert_eq!(def.modified_by.as_deref(), Some("alice"));
        assert!(def.last_modified >= before);
    }
}
