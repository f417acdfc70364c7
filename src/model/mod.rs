// src/model/mod.rs

//! Records the scheduler reads and produces.
//!
//! - [`task`] holds `TaskDefinition`, the persisted configuration of a job.
//! - [`execution`] holds `TaskExecution` (one supervised run) and the
//!   `Trigger` descriptor passed in by whoever started it.
//! - [`audit`] holds discrete action records.

pub mod audit;
pub mod execution;
pub mod task;

pub use audit::{AuditAction, AuditRecord};
pub use execution::{ExecutionId, TaskExecution, Trigger};
pub use task::{TaskDefinition, DEFAULT_TIMEOUT_SECONDS};

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// Identity of whoever scheduled, cancelled or triggered something.
pub type Actor = String;
