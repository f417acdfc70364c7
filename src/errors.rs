// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CronherdError {
    /// The script path does not point at an existing regular file.
    #[error("Script file not found: {0}")]
    InvalidScript(String),

    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("Task already scheduled: {0}")]
    AlreadyScheduled(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CronherdError {
    pub fn invalid_expression(expr: &str, reason: impl Into<String>) -> Self {
        CronherdError::InvalidExpression {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    /// Caller-side input problems (bad script path, bad cron expression).
    ///
    /// These are raised before any state is mutated.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CronherdError::InvalidScript(_) | CronherdError::InvalidExpression { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CronherdError::TaskNotFound(_) | CronherdError::ExecutionNotFound(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CronherdError>;
