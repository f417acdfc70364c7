// src/engine/registry.rs

//! Schedule registry: at most one live cron schedule per task id.
//!
//! Each schedule is a Tokio task sleeping until the next fire time of the
//! task's cron expression. A fire submits a SCHEDULED execution to the
//! executor without waiting for it, then computes the next fire time
//! strictly after the previous one.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audit::{record_or_log, AuditSink};
use crate::cron::CronExpr;
use crate::errors::{CronherdError, Result};
use crate::exec::Executor;
use crate::fs::FileSystem;
use crate::model::{AuditAction, AuditRecord, TaskDefinition, TaskId, Trigger};
use crate::store::TaskStore;

/// A running schedule for one task.
struct ScheduleHandle {
    cancel: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl ScheduleHandle {
    /// A schedule is live until its loop returns (cancelled or spent).
    fn is_live(&self) -> bool {
        !self.join.is_finished()
    }
}

/// Outcome of [`ScheduleRegistry::initialize_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub scheduled: Vec<TaskId>,
    /// Already had a live schedule.
    pub skipped: Vec<TaskId>,
    pub failed: Vec<(TaskId, String)>,
}

pub struct ScheduleRegistry {
    store: Arc<dyn TaskStore>,
    audit: Arc<dyn AuditSink>,
    fs: Arc<dyn FileSystem>,
    executor: Executor,
    handles: Mutex<HashMap<TaskId, ScheduleHandle>>,
}

impl fmt::Debug for ScheduleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleRegistry")
            .field("live", &self.live_task_ids())
            .finish_non_exhaustive()
    }
}

impl ScheduleRegistry {
    pub fn new(
        store: Arc<dyn TaskStore>,
        audit: Arc<dyn AuditSink>,
        fs: Arc<dyn FileSystem>,
        executor: Executor,
    ) -> Self {
        Self {
            store,
            audit,
            fs,
            executor,
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, ScheduleHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate, persist and arm a schedule for `def`.
    ///
    /// Fails with `AlreadyScheduled` if a live schedule exists, and with
    /// `InvalidScript` / `InvalidExpression` before anything is persisted.
    /// The whole check-then-arm sequence runs under the registry lock, so
    /// concurrent calls for one id arm at most one schedule.
    pub fn schedule(&self, mut def: TaskDefinition, actor: Option<&str>) -> Result<()> {
        let task_id = def.task_id.clone();

        {
            let mut handles = self.lock();
            if prune_stale(&mut handles, &task_id) {
                return Err(CronherdError::AlreadyScheduled(task_id));
            }

            let expr = self.validate(&def)?;

            def.created_by = actor.map(str::to_string);
            def.touch(actor);
            self.store.save_definition(&def)?;

            let handle = self.spawn_schedule(def.clone(), expr);
            handles.insert(task_id.clone(), handle);
        }

        info!(task = %task_id, cron = %def.cron_expression, "task scheduled");
        record_or_log(
            self.audit.as_ref(),
            AuditRecord::new(
                AuditAction::Scheduled,
                task_id,
                actor,
                format!("Task scheduled with cron: {}", def.cron_expression),
            ),
        );
        Ok(())
    }

    /// Persist `task_id` as disabled, then stop its schedule.
    ///
    /// Returns `false` (and records nothing) if no schedule was registered.
    /// If the definition cannot be saved the schedule keeps running.
    pub fn cancel(&self, task_id: &str, actor: Option<&str>) -> Result<bool> {
        {
            let mut handles = self.lock();
            if !handles.contains_key(task_id) {
                debug!(task = %task_id, "cancel requested but task is not scheduled");
                return Ok(false);
            }

            match self.store.find_definition(task_id) {
                Ok(mut def) => {
                    def.enabled = false;
                    def.touch(actor);
                    self.store.save_definition(&def)?;
                }
                Err(e) if e.is_not_found() => {
                    warn!(task = %task_id, "scheduled task has no stored definition; stopping anyway");
                }
                Err(e) => return Err(e),
            }

            if let Some(handle) = handles.remove(task_id) {
                // The loop may already have ended; nothing to do then.
                let _ = handle.cancel.send(());
            }
        }

        info!(task = %task_id, "task cancelled and disabled");
        record_or_log(
            self.audit.as_ref(),
            AuditRecord::new(
                AuditAction::Cancelled,
                task_id,
                actor,
                "Task cancelled and disabled",
            ),
        );
        Ok(true)
    }

    /// Arm a schedule for every enabled stored definition that lacks one.
    ///
    /// Definitions are not re-saved and nothing is audited. A failure for one
    /// task is reported and does not stop the others.
    pub fn initialize_all(&self) -> Result<InitReport> {
        let definitions = self.store.list_enabled_definitions()?;
        let mut report = InitReport::default();

        for def in definitions {
            let task_id = def.task_id.clone();
            let mut handles = self.lock();

            if prune_stale(&mut handles, &task_id) {
                warn!(task = %task_id, "task already has a live schedule; skipping");
                report.skipped.push(task_id);
                continue;
            }

            match self.validate(&def) {
                Ok(expr) => {
                    let handle = self.spawn_schedule(def, expr);
                    handles.insert(task_id.clone(), handle);
                    debug!(task = %task_id, "schedule restored");
                    report.scheduled.push(task_id);
                }
                Err(e) => {
                    warn!(task = %task_id, error = %e, "failed to restore schedule");
                    report.failed.push((task_id, e.to_string()));
                }
            }
        }

        info!(
            scheduled = report.scheduled.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "schedules initialized"
        );
        Ok(report)
    }

    /// Every stored task id with whether it currently has a live schedule.
    pub fn status_snapshot(&self) -> Result<BTreeMap<TaskId, bool>> {
        let definitions = self.store.list_definitions()?;
        let handles = self.lock();
        Ok(definitions
            .into_iter()
            .map(|def| {
                let live = handles.get(&def.task_id).is_some_and(ScheduleHandle::is_live);
                (def.task_id, live)
            })
            .collect())
    }

    pub fn is_scheduled(&self, task_id: &str) -> bool {
        self.lock().get(task_id).is_some_and(ScheduleHandle::is_live)
    }

    /// Ids with a live schedule, sorted.
    pub fn live_task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .lock()
            .iter()
            .filter(|(_, h)| h.is_live())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Stop every schedule without touching stored definitions.
    ///
    /// Executions already submitted keep running.
    pub fn shutdown(&self) {
        let handles: Vec<(TaskId, ScheduleHandle)> = self.lock().drain().collect();
        for (task_id, handle) in handles {
            debug!(task = %task_id, "stopping schedule");
            let _ = handle.cancel.send(());
        }
    }

    fn validate(&self, def: &TaskDefinition) -> Result<CronExpr> {
        if !self.fs.is_file(def.script()) {
            return Err(CronherdError::InvalidScript(def.script_path.clone()));
        }

        let expr = CronExpr::parse(&def.cron_expression)?;
        if expr.next_after(&Local::now()).is_none() {
            return Err(CronherdError::invalid_expression(
                &def.cron_expression,
                "expression never fires",
            ));
        }
        Ok(expr)
    }

    fn spawn_schedule(&self, def: TaskDefinition, expr: CronExpr) -> ScheduleHandle {
        let (cancel, cancel_rx) = oneshot::channel();
        let join = tokio::spawn(run_schedule(
            def,
            expr,
            Arc::clone(&self.store),
            self.executor.clone(),
            cancel_rx,
        ));
        ScheduleHandle { cancel, join }
    }
}

/// Drop a finished handle for `task_id`; returns whether a live one remains.
fn prune_stale(handles: &mut HashMap<TaskId, ScheduleHandle>, task_id: &str) -> bool {
    match handles.get(task_id) {
        Some(handle) if handle.is_live() => true,
        Some(_) => {
            debug!(task = %task_id, "removing finished schedule handle");
            handles.remove(task_id);
            false
        }
        None => false,
    }
}

/// The cron loop for one task.
///
/// Ends when cancelled, when the registry is dropped, or when the
/// expression has no further fire time. Each next fire is computed from the
/// later of the previous fire and the current time, so a stall (suspend,
/// starved runtime, clock jump) yields one late fire rather than a burst of
/// missed ones.
async fn run_schedule(
    registered: TaskDefinition,
    expr: CronExpr,
    store: Arc<dyn TaskStore>,
    executor: Executor,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let task_id = registered.task_id.clone();
    let mut reference: DateTime<Local> = Local::now();

    loop {
        let Some(next) = expr.next_after(&reference) else {
            info!(task = %task_id, cron = %expr, "no further fire times; schedule finished");
            break;
        };
        let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
        debug!(task = %task_id, next = %next, wait_ms = wait.as_millis() as u64, "waiting for next fire");

        tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                debug!(task = %task_id, "schedule cancelled");
                break;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        // Pick up edits (env, timeout, dependents) made since registration.
        let task = match store.find_definition(&task_id) {
            Ok(def) => def,
            Err(e) => {
                warn!(task = %task_id, error = %e, "failed to reload definition; using registered copy");
                registered.clone()
            }
        };

        if !task.enabled {
            debug!(task = %task_id, "definition disabled; skipping fire");
        } else if let Err(e) = executor.submit(task, Trigger::scheduled()) {
            warn!(task = %task_id, error = %e, "failed to submit scheduled execution");
        } else {
            debug!(task = %task_id, fire = %next, "scheduled execution submitted");
        }

        reference = next.max(Local::now());
    }
}
