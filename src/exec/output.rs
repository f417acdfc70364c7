// src/exec/output.rs

//! Line-by-line draining of a child's output channel.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::model::ExecutionId;
use crate::publish::{publish_or_log, OutputEvent, OutputKind, OutputPublisher};

/// Append-only text buffer shared between one drain task and the supervisor.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<String>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_line(&self, line: &str) {
        let mut buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        buf.push_str(line);
        buf.push('\n');
    }

    /// Whatever has been accumulated so far.
    pub fn snapshot(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Spawn a task that reads `reader` until EOF, appending each line to
/// `buffer` and publishing it as a `kind` event for `execution`.
///
/// Lines are decoded lossily so non-UTF-8 output cannot stop the drain.
pub fn spawn_drain<R>(
    reader: R,
    kind: OutputKind,
    buffer: OutputBuffer,
    publisher: Arc<dyn OutputPublisher>,
    execution: ExecutionId,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut raw = Vec::new();

        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    if raw.last() == Some(&b'\n') {
                        raw.pop();
                        if raw.last() == Some(&b'\r') {
                            raw.pop();
                        }
                    }
                    let line = String::from_utf8_lossy(&raw);
                    trace!(execution = %execution, kind = %kind, "{}", line);
                    buffer.push_line(&line);
                    publish_or_log(publisher.as_ref(), execution, OutputEvent::new(kind, line));
                }
                Err(e) => {
                    warn!(execution = %execution, kind = %kind, error = %e, "error reading process stream");
                    break;
                }
            }
        }
    })
}
