// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running task scripts, using
//! `tokio::process::Command`, and turning each run into a finalized
//! `TaskExecution`.
//!
//! - [`command`] builds the platform shell command for a task.
//! - [`output`] drains stdout/stderr line by line.
//! - [`supervisor`] owns one child process from spawn to finalization.
//! - [`executor`] runs or submits executions and starts the dependency
//!   cascade after a success.
//! - [`tracker`] counts in-flight executions so callers can wait for idle.

pub mod command;
pub mod executor;
pub mod output;
pub mod supervisor;
pub mod tracker;

pub use executor::Executor;
pub use supervisor::{Supervisor, SupervisorOptions, DEFAULT_DRAIN_GRACE};
pub use tracker::InFlight;
