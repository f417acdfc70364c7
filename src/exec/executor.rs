// src/exec/executor.rs

//! Entry point for running executions, awaited or submitted.
//!
//! - [`Executor::execute`] runs a task on the caller's task and returns the
//!   finalized record (manual runs).
//! - [`Executor::submit`] hands a task to the background dispatcher loop,
//!   which spawns one Tokio task per submission (cron fires, cascades).
//!
//! Either way, a SUCCESS result is followed by the dependency cascade.

use std::fmt;
use std::sync::{Arc, Weak};

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::audit::AuditSink;
use crate::dag::cascade::{trigger_dependents, ExecutionSubmitter};
use crate::errors::{CronherdError, Result};
use crate::exec::supervisor::{Supervisor, SupervisorOptions};
use crate::exec::tracker::{InFlight, InFlightGuard};
use crate::model::{TaskDefinition, TaskExecution, Trigger};
use crate::publish::OutputPublisher;
use crate::store::TaskStore;
use crate::types::ExecutionStatus;

/// A task queued for the dispatcher.
struct Submission {
    task: TaskDefinition,
    trigger: Trigger,
    guard: InFlightGuard,
}

struct Inner {
    supervisor: Supervisor,
    store: Arc<dyn TaskStore>,
    audit: Arc<dyn AuditSink>,
    submit_tx: mpsc::UnboundedSender<Submission>,
    in_flight: InFlight,
}

/// Cheap to clone; all clones share one dispatcher.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("in_flight", &self.inner.in_flight.count())
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Create an executor and start its dispatcher loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        store: Arc<dyn TaskStore>,
        publisher: Arc<dyn OutputPublisher>,
        audit: Arc<dyn AuditSink>,
        options: SupervisorOptions,
    ) -> Self {
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            supervisor: Supervisor::new(Arc::clone(&store), publisher, options),
            store,
            audit,
            submit_tx,
            in_flight: InFlight::new(),
        });

        spawn_dispatcher(Arc::downgrade(&inner), submit_rx);

        Self { inner }
    }

    /// Run `task` now and wait for the finalized execution.
    ///
    /// Dependents of a successful run are submitted, not awaited.
    pub async fn execute(&self, task: TaskDefinition, trigger: Trigger) -> TaskExecution {
        let guard = self.inner.in_flight.enter();
        run_to_completion(&self.inner, task, trigger, guard).await
    }

    /// Queue `task` for asynchronous execution.
    pub fn submit(&self, task: TaskDefinition, trigger: Trigger) -> Result<()> {
        self.inner.submit(task, trigger)
    }

    /// Number of executions submitted or running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.count()
    }

    /// Resolves once every submitted execution, including cascades started
    /// along the way, has finished.
    pub async fn wait_idle(&self) {
        self.inner.in_flight.wait_idle().await
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.inner.store
    }

    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.inner.audit
    }
}

impl ExecutionSubmitter for Inner {
    fn submit(&self, task: TaskDefinition, trigger: Trigger) -> Result<()> {
        let guard = self.in_flight.enter();
        let task_id = task.task_id.clone();
        self.submit_tx
            .send(Submission {
                task,
                trigger,
                guard,
            })
            .map_err(|_| {
                CronherdError::Other(anyhow!(
                    "dispatcher stopped; cannot submit task '{}'",
                    task_id
                ))
            })
    }
}

async fn run_to_completion(
    inner: &Inner,
    task: TaskDefinition,
    trigger: Trigger,
    _guard: InFlightGuard,
) -> TaskExecution {
    let exec = inner.supervisor.supervise(&task, trigger).await;

    if exec.status == ExecutionStatus::Success {
        trigger_dependents(
            inner.store.as_ref(),
            inner.audit.as_ref(),
            inner,
            &task,
            &exec,
        );
    }

    exec
}

/// Background loop: one spawned Tokio task per submission.
///
/// Holds only a weak reference so the loop ends once every `Executor` clone
/// is gone.
fn spawn_dispatcher(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<Submission>) {
    tokio::spawn(async move {
        info!("dispatcher loop started");

        while let Some(submission) = rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            debug!(
                task = %submission.task.task_id,
                trigger = %submission.trigger.kind,
                "dispatching execution"
            );
            tokio::spawn(async move {
                let Submission {
                    task,
                    trigger,
                    guard,
                } = submission;
                run_to_completion(&inner, task, trigger, guard).await;
            });
        }

        info!("dispatcher loop finished (channel closed)");
    });
}
