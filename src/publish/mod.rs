// src/publish/mod.rs

//! Publish interface for live execution output.
//!
//! Events for one execution are published in the order START, then any
//! STDOUT/STDERR lines (each channel in order), then END. Delivery is best
//! effort: a failed publish is logged by the caller and otherwise ignored.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::model::ExecutionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputKind {
    Start,
    Stdout,
    Stderr,
    Error,
    End,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputKind::Start => "START",
            OutputKind::Stdout => "STDOUT",
            OutputKind::Stderr => "STDERR",
            OutputKind::Error => "ERROR",
            OutputKind::End => "END",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub kind: OutputKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl OutputEvent {
    pub fn new(kind: OutputKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

pub trait OutputPublisher: Send + Sync {
    fn publish(&self, execution: ExecutionId, event: OutputEvent) -> Result<()>;
}

/// Publish and swallow failures.
pub fn publish_or_log(publisher: &dyn OutputPublisher, execution: ExecutionId, event: OutputEvent) {
    let kind = event.kind;
    if let Err(e) = publisher.publish(execution, event) {
        warn!(execution = %execution, kind = %kind, error = %e, "failed to publish output event");
    }
}

/// Fans events out to any number of `tokio::sync::broadcast` subscribers.
///
/// Slow subscribers lose the oldest events (`RecvError::Lagged`); with no
/// subscribers events are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<(ExecutionId, OutputEvent)>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(ExecutionId, OutputEvent)> {
        self.tx.subscribe()
    }
}

impl OutputPublisher for BroadcastPublisher {
    fn publish(&self, execution: ExecutionId, event: OutputEvent) -> Result<()> {
        // An error here only means nobody is listening.
        let _ = self.tx.send((execution, event));
        Ok(())
    }
}

/// Writes every event to the tracing log at debug level.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

impl OutputPublisher for LogPublisher {
    fn publish(&self, execution: ExecutionId, event: OutputEvent) -> Result<()> {
        debug!(execution = %execution, kind = %event.kind, "{}", event.content);
        Ok(())
    }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(ExecutionId, OutputEvent)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(ExecutionId, OutputEvent)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events of one execution, in publish order.
    pub fn events_for(&self, execution: ExecutionId) -> Vec<OutputEvent> {
        self.events()
            .into_iter()
            .filter(|(id, _)| *id == execution)
            .map(|(_, e)| e)
            .collect()
    }
}

impl OutputPublisher for RecordingPublisher {
    fn publish(&self, execution: ExecutionId, event: OutputEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((execution, event));
        Ok(())
    }
}
