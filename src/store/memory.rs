// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{sort_newest_first, TaskStore};
use crate::errors::{CronherdError, Result};
use crate::model::{ExecutionId, TaskDefinition, TaskExecution, TaskId};

#[derive(Debug, Default)]
struct Inner {
    definitions: BTreeMap<TaskId, TaskDefinition>,
    executions: HashMap<ExecutionId, TaskExecution>,
}

/// Stores definitions and executions in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with definitions (test and config convenience).
    pub fn with_definitions(defs: impl IntoIterator<Item = TaskDefinition>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for def in defs {
                inner.definitions.insert(def.task_id.clone(), def);
            }
        }
        store
    }

    /// Every stored execution, newest first.
    pub fn all_executions(&self) -> Vec<TaskExecution> {
        let mut out: Vec<TaskExecution> = self.lock().executions.values().cloned().collect();
        sort_newest_first(&mut out);
        out
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskStore for MemoryStore {
    fn save_definition(&self, def: &TaskDefinition) -> Result<()> {
        self.lock()
            .definitions
            .insert(def.task_id.clone(), def.clone());
        debug!(task = %def.task_id, "stored task definition (memory)");
        Ok(())
    }

    fn find_definition(&self, task_id: &str) -> Result<TaskDefinition> {
        self.lock()
            .definitions
            .get(task_id)
            .cloned()
            .ok_or_else(|| CronherdError::TaskNotFound(task_id.to_string()))
    }

    fn list_definitions(&self) -> Result<Vec<TaskDefinition>> {
        Ok(self.lock().definitions.values().cloned().collect())
    }

    fn save_execution(&self, exec: &TaskExecution) -> Result<()> {
        self.lock().executions.insert(exec.id, exec.clone());
        Ok(())
    }

    fn find_execution(&self, id: ExecutionId) -> Result<TaskExecution> {
        self.lock()
            .executions
            .get(&id)
            .cloned()
            .ok_or_else(|| CronherdError::ExecutionNotFound(id.to_string()))
    }

    fn list_executions(&self, task_id: &str) -> Result<Vec<TaskExecution>> {
        let mut out: Vec<TaskExecution> = self
            .lock()
            .executions
            .values()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect();
        sort_newest_first(&mut out);
        Ok(out)
    }
}
