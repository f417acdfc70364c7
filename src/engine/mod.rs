// src/engine/mod.rs

//! Scheduling engine for cronherd.
//!
//! - [`registry`] owns the per-task cron loops (at most one live schedule
//!   per task id).
//! - [`scheduler`] is the facade combining registry, executor and store:
//!   schedule, cancel, manual runs, dependents and read access.

pub mod registry;
pub mod scheduler;

pub use registry::{InitReport, ScheduleRegistry};
pub use scheduler::{SchedulerParts, TaskScheduler};
