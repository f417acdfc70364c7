use std::sync::Arc;
use std::time::Duration;

use cronherd::audit::MemoryAuditLog;
use cronherd::engine::{SchedulerParts, TaskScheduler};
use cronherd::exec::SupervisorOptions;
use cronherd::fs::{FileSystem, RealFileSystem};
use cronherd::model::TaskExecution;
use cronherd::publish::RecordingPublisher;
use cronherd::store::{MemoryStore, TaskStore};

/// A `TaskScheduler` over in-memory collaborators the test can inspect.
pub struct Harness {
    pub scheduler: TaskScheduler,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub publisher: Arc<RecordingPublisher>,
}

impl Harness {
    /// Real filesystem, short drain grace. Needs a Tokio runtime.
    pub fn new() -> Self {
        Self::with_fs(Arc::new(RealFileSystem))
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let publisher = Arc::new(RecordingPublisher::new());

        let scheduler = TaskScheduler::new(SchedulerParts {
            store: store.clone(),
            publisher: publisher.clone(),
            audit: audit.clone(),
            fs,
            options: SupervisorOptions {
                drain_grace: Duration::from_millis(500),
            },
        });

        Self {
            scheduler,
            store,
            audit,
            publisher,
        }
    }

    /// Finished executions of `task_id`, newest first.
    pub fn finished(&self, task_id: &str) -> Vec<TaskExecution> {
        self.store
            .list_executions(task_id)
            .expect("list executions")
            .into_iter()
            .filter(|e| e.is_finished())
            .collect()
    }

    /// Poll until `task_id` has at least `n` finished executions.
    pub async fn wait_for_finished(&self, task_id: &str, n: usize) -> Vec<TaskExecution> {
        loop {
            let done = self.finished(task_id);
            if done.len() >= n {
                return done;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
