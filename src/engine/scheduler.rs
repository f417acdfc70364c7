// src/engine/scheduler.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::audit::{record_or_log, AuditSink};
use crate::errors::{CronherdError, Result};
use crate::exec::{Executor, SupervisorOptions};
use crate::fs::FileSystem;
use crate::model::{
    AuditAction, AuditRecord, ExecutionId, TaskDefinition, TaskExecution, TaskId, Trigger,
};
use crate::publish::OutputPublisher;
use crate::store::TaskStore;

use super::registry::{InitReport, ScheduleRegistry};

/// Everything a [`TaskScheduler`] is built from.
pub struct SchedulerParts {
    pub store: Arc<dyn TaskStore>,
    pub publisher: Arc<dyn OutputPublisher>,
    pub audit: Arc<dyn AuditSink>,
    pub fs: Arc<dyn FileSystem>,
    pub options: SupervisorOptions,
}

/// Facade over the schedule registry, the executor and the store.
///
/// This is what the CLI (or any embedding service) talks to.
pub struct TaskScheduler {
    store: Arc<dyn TaskStore>,
    audit: Arc<dyn AuditSink>,
    executor: Executor,
    registry: ScheduleRegistry,
}

impl fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("registry", &self.registry)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl TaskScheduler {
    /// Must be called from within a Tokio runtime.
    pub fn new(parts: SchedulerParts) -> Self {
        let SchedulerParts {
            store,
            publisher,
            audit,
            fs,
            options,
        } = parts;

        let executor = Executor::new(
            Arc::clone(&store),
            publisher,
            Arc::clone(&audit),
            options,
        );
        let registry = ScheduleRegistry::new(
            Arc::clone(&store),
            Arc::clone(&audit),
            fs,
            executor.clone(),
        );

        Self {
            store,
            audit,
            executor,
            registry,
        }
    }

    pub fn schedule(&self, def: TaskDefinition, actor: Option<&str>) -> Result<()> {
        self.registry.schedule(def, actor)
    }

    pub fn cancel(&self, task_id: &str, actor: Option<&str>) -> Result<bool> {
        self.registry.cancel(task_id, actor)
    }

    pub fn initialize_all(&self) -> Result<InitReport> {
        self.registry.initialize_all()
    }

    pub fn status_snapshot(&self) -> Result<BTreeMap<TaskId, bool>> {
        self.registry.status_snapshot()
    }

    pub fn is_scheduled(&self, task_id: &str) -> bool {
        self.registry.is_scheduled(task_id)
    }

    /// Run a stored task now, outside its schedule, and wait for the result.
    ///
    /// Runs even when the task is disabled. Dependents of a successful run
    /// are triggered as usual.
    pub async fn execute_manually(
        &self,
        task_id: &str,
        actor: Option<&str>,
    ) -> Result<TaskExecution> {
        let def = self.store.find_definition(task_id)?;
        if !def.enabled {
            warn!(task = %task_id, "executing disabled task manually");
        }

        info!(task = %task_id, actor = actor.unwrap_or("-"), "manual execution requested");
        let exec = self
            .executor
            .execute(def, Trigger::manual(actor.map(str::to_string)))
            .await;

        record_or_log(
            self.audit.as_ref(),
            AuditRecord::new(
                AuditAction::ManualExecution,
                task_id,
                actor,
                "Task executed manually",
            ),
        );
        Ok(exec)
    }

    /// Replace the dependents of `task_id`.
    ///
    /// The task itself and ids with no stored definition are dropped from
    /// `dependents` (with a warning). Returns the set actually stored.
    pub fn update_dependents(
        &self,
        task_id: &str,
        dependents: impl IntoIterator<Item = TaskId>,
        actor: Option<&str>,
    ) -> Result<BTreeSet<TaskId>> {
        let mut def = self.store.find_definition(task_id)?;

        let mut kept = BTreeSet::new();
        for dep in dependents {
            if dep == task_id {
                warn!(task = %task_id, "ignoring task listed as its own dependent");
                continue;
            }
            match self.store.find_definition(&dep) {
                Ok(_) => {
                    kept.insert(dep);
                }
                Err(e) if e.is_not_found() => {
                    warn!(task = %task_id, dependent = %dep, "ignoring unknown dependent");
                }
                Err(e) => return Err(e),
            }
        }

        def.dependents = kept.clone();
        def.touch(actor);
        self.store.save_definition(&def)?;

        let listed = if kept.is_empty() {
            "none".to_string()
        } else {
            kept.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
        };
        record_or_log(
            self.audit.as_ref(),
            AuditRecord::new(
                AuditAction::DependenciesUpdated,
                task_id,
                actor,
                format!("Dependencies updated: {listed}"),
            ),
        );
        Ok(kept)
    }

    pub fn find_definition(&self, task_id: &str) -> Result<TaskDefinition> {
        self.store.find_definition(task_id)
    }

    pub fn list_definitions(&self) -> Result<Vec<TaskDefinition>> {
        self.store.list_definitions()
    }

    pub fn find_execution(&self, id: ExecutionId) -> Result<TaskExecution> {
        self.store.find_execution(id)
    }

    /// Executions of one task, newest first.
    pub fn executions_for(&self, task_id: &str) -> Result<Vec<TaskExecution>> {
        self.store.list_executions(task_id)
    }

    pub fn running_executions(&self, task_id: &str) -> Result<Vec<TaskExecution>> {
        self.store.running_executions(task_id)
    }

    /// Audit records kept by the configured sink, newest first.
    pub fn audit_log(&self, task_id: Option<&str>) -> Vec<AuditRecord> {
        self.audit.recent(task_id)
    }

    /// Most recent execution of `task_id`.
    pub fn last_execution(&self, task_id: &str) -> Result<TaskExecution> {
        self.executions_for(task_id)?
            .into_iter()
            .next()
            .ok_or_else(|| CronherdError::ExecutionNotFound(format!("no executions of '{task_id}'")))
    }

    /// Wait until no execution (scheduled, manual or cascaded) is in flight.
    pub async fn wait_idle(&self) {
        self.executor.wait_idle().await
    }

    /// Stop all schedules; in-flight executions are left to finish.
    pub fn shutdown(&self) {
        self.registry.shutdown()
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }
}
