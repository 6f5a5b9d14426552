use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, StrataResult};
use crate::source::base::{EventSource, SourceBatch, SourcePosition};
use crate::strata_error;

#[derive(Debug)]
struct Inner {
    /// Scripted batches in delivery order.
    batches: Vec<Vec<JsonValue>>,
    /// Index of the last committed batch, if any. Plays the role of the
    /// durable checkpoint: it survives [`MemorySource::reopen`].
    committed: Option<usize>,
    /// Index of the next batch to deliver.
    cursor: usize,
}

/// In-memory event source for testing and development.
///
/// Batches are scripted with [`MemorySource::push_batch`] and delivered in
/// order. The committed position is shared between clones, so
/// [`MemorySource::reopen`] models a process restart: the new handle resumes
/// delivery right after the last committed batch, exactly as a durable
/// checkpoint would make a real source do.
#[derive(Debug, Clone)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    /// Creates an empty memory source.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                batches: Vec::new(),
                committed: None,
                cursor: 0,
            })),
        }
    }

    /// Appends a batch to the delivery script.
    pub async fn push_batch(&self, payloads: Vec<JsonValue>) {
        let mut inner = self.inner.lock().await;
        inner.batches.push(payloads);
    }

    /// Returns the number of committed batches.
    pub async fn committed_batches(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.committed.map(|index| index + 1).unwrap_or(0)
    }

    /// Reopens the source as after a crash and restart.
    ///
    /// Delivery restarts from the durable checkpoint: everything after the
    /// last committed batch is delivered again, committed batches are not.
    pub async fn reopen(&self) -> MemorySource {
        let mut inner = self.inner.lock().await;
        inner.cursor = inner.committed.map(|index| index + 1).unwrap_or(0);
        MemorySource {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for MemorySource {
    async fn next_batch(&mut self) -> StrataResult<Option<SourceBatch>> {
        let mut inner = self.inner.lock().await;

        if inner.cursor >= inner.batches.len() {
            return Ok(None);
        }

        let batch = SourceBatch {
            position: SourcePosition::new(inner.cursor.to_string()),
            payloads: inner.batches[inner.cursor].clone(),
        };
        inner.cursor += 1;

        Ok(Some(batch))
    }

    async fn commit(&mut self, position: SourcePosition) -> StrataResult<()> {
        let index: usize = position.as_str().parse().map_err(|_| {
            strata_error!(
                ErrorKind::CheckpointError,
                "Position token is not a batch index",
                position.as_str()
            )
        })?;

        let mut inner = self.inner.lock().await;

        // Re-committing an already committed position is an idempotent
        // retry; moving backwards past it is not.
        if let Some(committed) = inner.committed
            && index < committed
        {
            bail!(
                ErrorKind::CheckpointError,
                "Checkpoint would move backwards",
                format!("attempted to commit batch {index} after batch {committed}")
            );
        }

        inner.committed = Some(index);

        Ok(())
    }
}
