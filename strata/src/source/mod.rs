//! Change-event sources.
//!
//! A source hands the landing stage batches of raw payloads together with an
//! opaque position, and persists that position once the batch is landed. The
//! discovery mechanics (which files exist, what has already been consumed)
//! stay behind the [`EventSource`] trait.

pub mod base;
pub mod memory;
pub mod ndjson;

pub use base::{EventSource, SourceBatch, SourcePosition};
pub use memory::MemorySource;
pub use ndjson::NdjsonDirSource;
