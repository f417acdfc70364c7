// src/cron/mod.rs

//! Cron trigger: pure "reference instant -> next fire instant" computation.
//!
//! Nothing in here touches timers or clocks other than the instant it is
//! handed; the schedule registry drives the actual sleeping.

mod field;
pub mod expr;

pub use expr::{next_fire, CronExpr};
