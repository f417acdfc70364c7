// src/exec/supervisor.rs

//! Supervision of a single script run: spawn, stream, timeout, finalize.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::exec::command::shell_command;
use crate::exec::output::{spawn_drain, OutputBuffer};
use crate::model::{ExecutionId, TaskDefinition, TaskExecution, Trigger};
use crate::publish::{publish_or_log, OutputEvent, OutputKind, OutputPublisher};
use crate::store::TaskStore;
use crate::types::ExecutionStatus;

/// Default bound on how long finalization waits for the output drains.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// Once the process has exited (or been killed), how long to wait for the
    /// stdout/stderr readers before taking what they have collected.
    pub drain_grace: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }
}

/// How the child process ended.
enum ProcessOutcome {
    /// Exited on its own; `None` when killed by a signal.
    Exited(Option<i32>),
    TimedOut,
}

/// Runs one task script per call and produces its terminal execution record.
///
/// Each call owns exactly one child process and one `TaskExecution`. Calls
/// for the same task may overlap; nothing here serialises them.
#[derive(Clone)]
pub struct Supervisor {
    store: Arc<dyn TaskStore>,
    publisher: Arc<dyn OutputPublisher>,
    options: SupervisorOptions,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn TaskStore>,
        publisher: Arc<dyn OutputPublisher>,
        options: SupervisorOptions,
    ) -> Self {
        Self {
            store,
            publisher,
            options,
        }
    }

    /// Run `task` once and return the finalized execution.
    ///
    /// Never fails: spawn and I/O errors end up as a FAILED execution with
    /// `error_message` set, and a timeout is the TIMEOUT status.
    pub async fn supervise(&self, task: &TaskDefinition, trigger: Trigger) -> TaskExecution {
        let mut exec = TaskExecution::begin(&task.task_id, &trigger);
        self.persist(&exec);

        info!(
            task = %task.task_id,
            execution = %exec.id,
            trigger = %exec.trigger,
            parent = ?exec.parent_execution,
            "starting task execution"
        );
        self.emit(exec.id, OutputKind::Start, "Starting task execution...");

        let stdout = OutputBuffer::new();
        let stderr = OutputBuffer::new();
        let mut drains = Vec::with_capacity(2);

        match self
            .run_process(task, exec.id, &stdout, &stderr, &mut drains)
            .await
        {
            Ok(ProcessOutcome::Exited(Some(code))) => exec.record_exit(code),
            Ok(ProcessOutcome::Exited(None)) => {
                exec.set_status(ExecutionStatus::Failed);
            }
            Ok(ProcessOutcome::TimedOut) => {
                exec.set_status(ExecutionStatus::Timeout);
                warn!(
                    task = %task.task_id,
                    execution = %exec.id,
                    timeout_seconds = task.timeout_seconds,
                    "task timed out; process killed"
                );
                self.emit(
                    exec.id,
                    OutputKind::Error,
                    format!("Task timeout after {} seconds", task.timeout_seconds),
                );
            }
            Err(err) => {
                error!(task = %task.task_id, execution = %exec.id, error = %err, "task execution failed");
                let message = format!("{err:#}");
                self.emit(
                    exec.id,
                    OutputKind::Error,
                    format!("Execution failed: {message}"),
                );
                exec.record_failure(message);
            }
        }

        self.join_drains(exec.id, drains).await;
        exec.stdout = stdout.snapshot();
        exec.stderr = stderr.snapshot();

        exec.finalize();
        self.persist(&exec);
        self.emit(
            exec.id,
            OutputKind::End,
            format!("Task completed with status: {}", exec.status),
        );

        info!(
            task = %task.task_id,
            execution = %exec.id,
            status = %exec.status,
            exit_code = ?exec.exit_code,
            elapsed_ms = exec.elapsed_ms.unwrap_or_default(),
            "task execution finished"
        );

        exec
    }

    async fn run_process(
        &self,
        task: &TaskDefinition,
        execution: ExecutionId,
        stdout_buf: &OutputBuffer,
        stderr_buf: &OutputBuffer,
        drains: &mut Vec<JoinHandle<()>>,
    ) -> Result<ProcessOutcome> {
        let mut cmd = shell_command(task);
        debug!(task = %task.task_id, execution = %execution, script = %task.script_path, "spawning process");

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", task.task_id))?;

        if let Some(out) = child.stdout.take() {
            drains.push(spawn_drain(
                out,
                OutputKind::Stdout,
                stdout_buf.clone(),
                Arc::clone(&self.publisher),
                execution,
            ));
        }
        if let Some(err) = child.stderr.take() {
            drains.push(spawn_drain(
                err,
                OutputKind::Stderr,
                stderr_buf.clone(),
                Arc::clone(&self.publisher),
                execution,
            ));
        }

        match tokio::time::timeout(task.timeout(), child.wait()).await {
            Ok(status) => {
                let status = status
                    .with_context(|| format!("waiting for process of task '{}'", task.task_id))?;
                Ok(ProcessOutcome::Exited(status.code()))
            }
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    warn!(
                        task = %task.task_id,
                        execution = %execution,
                        error = %e,
                        "failed to kill timed-out process"
                    );
                }
                Ok(ProcessOutcome::TimedOut)
            }
        }
    }

    /// Wait for the output readers, but no longer than the drain grace.
    async fn join_drains(&self, execution: ExecutionId, drains: Vec<JoinHandle<()>>) {
        let deadline = Instant::now() + self.options.drain_grace;
        for mut handle in drains {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(execution = %execution, error = %e, "output reader task failed");
                }
                Err(_) => {
                    warn!(
                        execution = %execution,
                        grace_ms = self.options.drain_grace.as_millis() as u64,
                        "output reader still running after grace period; using partial output"
                    );
                    handle.abort();
                }
            }
        }
    }

    fn persist(&self, exec: &TaskExecution) {
        if let Err(e) = self.store.save_execution(exec) {
            error!(task = %exec.task_id, execution = %exec.id, error = %e, "failed to save execution");
        }
    }

    fn emit(&self, execution: ExecutionId, kind: OutputKind, content: impl Into<String>) {
        publish_or_log(self.publisher.as_ref(), execution, OutputEvent::new(kind, content));
    }
}
