use std::collections::BTreeMap;
use std::future::Future;

use crate::error::StrataResult;
use crate::types::{Record, TableName, Value};

/// A single keyed action produced by state resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowAction {
    /// Insert or overwrite the row for this key.
    Upsert(Record),
    /// Remove the row for this key; a no-op if the key is absent.
    Delete,
}

/// Resolved actions for one merge invocation, at most one per business key.
pub type MergePlan = Vec<(Value, RowAction)>;

/// Outcome of applying a merge plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl MergeOutcome {
    /// Total number of keys whose row actually changed.
    pub fn keys_affected(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

/// Trait for the transactional table storage collaborator.
///
/// A [`TableStore`] owns the physical tables of both layers: the append-only
/// raw logs the landing stage writes, and the keyed tables resolution
/// maintains. Every mutating operation is atomic: either all of its effects
/// are visible to readers or none are.
///
/// Keyed-table writes additionally serialize per table. At most one merge or
/// append transaction may be in flight per table; a losing concurrent
/// attempt aborts with `TransactionConflict` and no partial effect, leaving
/// the retry to the invoking scheduler.
pub trait TableStore {
    /// Appends rows to an append-only log table atomically.
    ///
    /// Log tables have no key; duplicates and out-of-order rows are expected
    /// and preserved.
    fn append_rows(
        &self,
        table: &TableName,
        rows: Vec<Record>,
    ) -> impl Future<Output = StrataResult<()>> + Send;

    /// Reads the full contents of a log table in append order.
    ///
    /// Returns an empty list for a table nothing has been appended to yet.
    fn scan_log(
        &self,
        table: &TableName,
    ) -> impl Future<Output = StrataResult<Vec<Record>>> + Send;

    /// Applies a merge plan to a keyed table as one transaction.
    ///
    /// Upserts insert or overwrite, deletes remove if present. A plan that
    /// names the same key twice would break the one-row-per-key invariant
    /// and is rejected as `ConstraintViolation` without applying anything.
    fn apply_merge(
        &self,
        table: &TableName,
        plan: MergePlan,
    ) -> impl Future<Output = StrataResult<MergeOutcome>> + Send;

    /// Inserts rows whose key is not yet present, as one transaction.
    ///
    /// Rows with a key already in the table are skipped untouched. Returns
    /// the number of rows actually inserted.
    fn append_new_keys(
        &self,
        table: &TableName,
        key_column: &str,
        rows: Vec<Record>,
    ) -> impl Future<Output = StrataResult<usize>> + Send;

    /// Reads a keyed table's rows by key.
    ///
    /// Returns an empty map for a table that has never been written.
    fn keyed_rows(
        &self,
        table: &TableName,
    ) -> impl Future<Output = StrataResult<BTreeMap<Value, Record>>> + Send;
}
