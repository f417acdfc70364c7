// src/audit/file.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use super::{AuditSink, LogAuditSink, MemoryAuditLog};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::model::AuditRecord;

/// Audit log file, relative to the state directory. One JSON record per line.
pub const AUDIT_FILE: &str = "audit.jsonl";

/// Appends every audit record to `audit.jsonl` and keeps the most recent
/// ones in memory for [`AuditSink::recent`].
///
/// The file is never rewritten, so recording costs one append regardless of
/// how long the log has grown.
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    recent: MemoryAuditLog,
    /// Keeps the file order and the memory order the same.
    append_lock: Mutex<()>,
}

impl FileAuditLog {
    /// Open (or start) the log under `state_dir`, loading existing records.
    ///
    /// Lines that do not parse (a torn final write) are skipped with a
    /// warning.
    pub fn open(state_dir: impl AsRef<Path>, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let path = state_dir.as_ref().join(AUDIT_FILE);
        let recent = MemoryAuditLog::new();

        let mut loaded = 0usize;
        if fs.is_file(&path) {
            let contents = fs.read_to_string(&path)?;
            for (idx, line) in contents.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AuditRecord>(line) {
                    Ok(record) => {
                        recent.push(record);
                        loaded += 1;
                    }
                    Err(e) => {
                        warn!(path = ?path, line = idx + 1, error = %e, "skipping unreadable audit record");
                    }
                }
            }
        }

        info!(path = ?path, records = loaded, "opened audit log");
        Ok(Self {
            path,
            fs,
            recent,
            append_lock: Mutex::new(()),
        })
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, record: AuditRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.append_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.fs.append(&self.path, &line)?;
        LogAuditSink.record(record.clone())?;
        self.recent.push(record);
        Ok(())
    }

    fn recent(&self, task_id: Option<&str>) -> Vec<AuditRecord> {
        self.recent.recent(task_id)
    }
}
