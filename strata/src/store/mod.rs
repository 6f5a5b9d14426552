//! Transactional table storage.
//!
//! The pipeline never talks to a storage engine directly; it goes through
//! the [`TableStore`] trait, which models the two table shapes it needs:
//! append-only logs for the raw layer and keyed tables for the resolved
//! layer, with atomic, per-table-serialized transactions on the latter.

pub mod base;
pub mod memory;

pub use base::{MergeOutcome, MergePlan, RowAction, TableStore};
pub use memory::MemoryStore;
