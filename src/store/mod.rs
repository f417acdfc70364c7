// src/store/mod.rs

//! Durable store interface for definitions and executions.
//!
//! The scheduler treats the store as synchronous: every call may block the
//! worker that makes it. Missing keys come back as `TaskNotFound` /
//! `ExecutionNotFound`.
//!
//! - [`MemoryStore`] keeps everything in-process (lost on restart).
//! - [`FileStore`] keeps JSON documents under a state directory.

use std::sync::Arc;

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::model::{ExecutionId, TaskDefinition, TaskExecution};
use crate::types::{ExecutionStatus, StoreMode};

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

pub trait TaskStore: Send + Sync {
    /// Insert or replace by task id.
    fn save_definition(&self, def: &TaskDefinition) -> Result<()>;

    fn find_definition(&self, task_id: &str) -> Result<TaskDefinition>;

    /// All definitions, ordered by task id.
    fn list_definitions(&self) -> Result<Vec<TaskDefinition>>;

    fn list_enabled_definitions(&self) -> Result<Vec<TaskDefinition>> {
        Ok(self
            .list_definitions()?
            .into_iter()
            .filter(|d| d.enabled)
            .collect())
    }

    /// Insert or replace by execution id.
    fn save_execution(&self, exec: &TaskExecution) -> Result<()>;

    fn find_execution(&self, id: ExecutionId) -> Result<TaskExecution>;

    /// Executions of one task, newest first.
    fn list_executions(&self, task_id: &str) -> Result<Vec<TaskExecution>>;

    fn running_executions(&self, task_id: &str) -> Result<Vec<TaskExecution>> {
        Ok(self
            .list_executions(task_id)?
            .into_iter()
            .filter(|e| e.status == ExecutionStatus::Running)
            .collect())
    }
}

/// Build the store selected by `[config].store`.
pub fn store_from_config(cfg: &ConfigFile) -> Result<Arc<dyn TaskStore>> {
    let store: Arc<dyn TaskStore> = match cfg.config.store {
        StoreMode::Memory => Arc::new(MemoryStore::new()),
        StoreMode::File => Arc::new(FileStore::open(
            cfg.state_dir(),
            Arc::new(RealFileSystem),
        )?),
    };
    Ok(store)
}

/// Newest first, ties broken by id for a stable order.
pub(crate) fn sort_newest_first(executions: &mut [TaskExecution]) {
    executions.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.id.cmp(&b.id))
    });
}
