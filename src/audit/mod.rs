// src/audit/mod.rs

//! Audit sink: discrete action records (schedule, cancel, manual run,
//! cascade) with the actor who caused them.
//!
//! Recording is fire-and-forget. A failing sink never fails the operation
//! that produced the record; see [`record_or_log`].
//!
//! - [`LogAuditSink`] only logs.
//! - [`MemoryAuditLog`] keeps the most recent records in-process.
//! - [`FileAuditLog`] appends every record to `audit.jsonl` under the state
//!   directory and serves recent ones from memory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::model::{AuditAction, AuditRecord};
use crate::types::StoreMode;

pub mod file;

pub use file::FileAuditLog;

/// Records kept in memory by [`MemoryAuditLog::new`]; older ones are dropped.
pub const DEFAULT_AUDIT_RETENTION: usize = 10_000;

pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> Result<()>;

    /// Records kept by this sink, newest first, optionally for one task.
    ///
    /// Sinks that only forward records return nothing.
    fn recent(&self, _task_id: Option<&str>) -> Vec<AuditRecord> {
        Vec::new()
    }
}

/// Record and swallow failures.
pub fn record_or_log(sink: &dyn AuditSink, record: AuditRecord) {
    let action = record.action;
    let task = record.task_id.clone();
    if let Err(e) = sink.record(record) {
        warn!(action = %action, task = %task, error = %e, "failed to save audit record");
    }
}

/// Writes audit records to the tracing log only.
#[derive(Debug, Clone, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, record: AuditRecord) -> Result<()> {
        info!(
            action = %record.action,
            task = %record.task_id,
            actor = record.actor.as_deref().unwrap_or("-"),
            "audit: {}",
            record.details
        );
        Ok(())
    }
}

/// Build the sink selected by `[config].store`.
pub fn audit_from_config(cfg: &ConfigFile) -> Result<Arc<dyn AuditSink>> {
    let sink: Arc<dyn AuditSink> = match cfg.config.store {
        StoreMode::Memory => Arc::new(MemoryAuditLog::new()),
        StoreMode::File => Arc::new(FileAuditLog::open(
            cfg.state_dir(),
            Arc::new(RealFileSystem),
        )?),
    };
    Ok(sink)
}

/// Keeps the most recent audit records in memory (and logs them like
/// [`LogAuditSink`]).
#[derive(Debug)]
pub struct MemoryAuditLog {
    records: Mutex<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_RETENTION)
    }
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// All kept records, newest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().iter().rev().cloned().collect()
    }

    pub fn for_task(&self, task_id: &str) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.task_id == task_id)
            .collect()
    }

    pub fn count(&self, action: AuditAction, task_id: &str) -> usize {
        self.for_task(task_id)
            .iter()
            .filter(|r| r.action == action)
            .count()
    }
}

impl MemoryAuditLog {
    /// Keep `record` without logging it.
    pub(crate) fn push(&self, record: AuditRecord) {
        let mut records = self.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, record: AuditRecord) -> Result<()> {
        LogAuditSink.record(record.clone())?;
        self.push(record);
        Ok(())
    }

    fn recent(&self, task_id: Option<&str>) -> Vec<AuditRecord> {
        match task_id {
            Some(id) => self.for_task(id),
            None => self.records(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CronherdError;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _record: AuditRecord) -> Result<()> {
            Err(CronherdError::ConfigError("sink offline".into()))
        }
    }

    #[test]
    fn failing_sink_is_swallowed() {
        record_or_log(
            &FailingSink,
            AuditRecord::new(AuditAction::Scheduled, "a", None, "x"),
        );
    }

    #[test]
    fn memory_log_is_newest_first_and_filterable() {
        let log = MemoryAuditLog::new();
        record_or_log(&log, AuditRecord::new(AuditAction::Scheduled, "a", Some("u"), "1"));
        record_or_log(&log, AuditRecord::new(AuditAction::Cancelled, "a", Some("u"), "2"));
        record_or_log(&log, AuditRecord::new(AuditAction::Scheduled, "b", None, "3"));

        let a = log.for_task("a");
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].action, AuditAction::Cancelled);
        assert_eq!(log.count(AuditAction::Scheduled, "b"), 1);
    }

    #[test]
    fn memory_log_drops_oldest_beyond_capacity() {
        let log = MemoryAuditLog::with_capacity(2);
        for details in ["1", "2", "3"] {
            record_or_log(&log, AuditRecord::new(AuditAction::Scheduled, "a", None, details));
        }

        let kept: Vec<_> = log.records().into_iter().map(|r| r.details).collect();
        assert_eq!(kept, vec!["3".to_string(), "2".to_string()]);
    }
}
