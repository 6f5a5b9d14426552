use std::fmt;
use std::future::Future;

use serde_json::Value as JsonValue;

use crate::error::StrataResult;

/// Opaque position of a batch within a source's delivery order.
///
/// Positions are produced by the source, committed back to it verbatim, and
/// never interpreted by the pipeline. They must order consistently with
/// delivery: a source never delivers a batch at or before its last committed
/// position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourcePosition(String);

impl SourcePosition {
    /// Wraps a source-defined position token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the position token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One batch of change-event payloads delivered by a source.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    /// Position to commit once every payload in the batch is landed.
    pub position: SourcePosition,
    /// Raw payloads in delivery order.
    pub payloads: Vec<JsonValue>,
}

/// Trait for collaborators that discover newly arrived change events.
///
/// An [`EventSource`] yields a lazy, unbounded, restartable sequence of
/// payload batches for one entity. The landing stage drives it with the
/// contract:
///
/// 1. [`EventSource::next_batch`] returns the earliest batch after the last
///    committed position, or `None` when nothing new is available;
/// 2. the batch is landed durably;
/// 3. [`EventSource::commit`] persists the batch's position.
///
/// A source re-opened over the same checkpoint resumes after the last
/// committed position: committed batches are never redelivered and
/// uncommitted ones are never skipped, which gives exactly-once landing per
/// batch as long as step 3 only runs after step 2 succeeds.
pub trait EventSource {
    /// Returns the next unlanded batch, or `None` when the source is drained.
    fn next_batch(&mut self) -> impl Future<Output = StrataResult<Option<SourceBatch>>> + Send;

    /// Durably records that every payload up to `position` has been landed.
    fn commit(&mut self, position: SourcePosition)
    -> impl Future<Output = StrataResult<()>> + Send;
}
