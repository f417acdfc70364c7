// src/dag/mod.rs

//! Task-to-task dependencies.
//!
//! - [`graph`] holds the parent -> dependent relation for diagnostics
//!   (dry-run listing, loop warnings).
//! - [`cascade`] triggers dependents after a successful execution.

pub mod cascade;
pub mod graph;

pub use cascade::{trigger_dependents, ExecutionSubmitter};
pub use graph::DependencyGraph;
