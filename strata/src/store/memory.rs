use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::bail;
use crate::error::{ErrorKind, StrataResult};
use crate::store::base::{MergeOutcome, MergePlan, RowAction, TableStore};
use crate::strata_error;
use crate::types::{Record, TableName, Value};

#[derive(Debug, Default)]
struct Inner {
    /// Append-only raw logs in append order.
    logs: HashMap<TableName, Vec<Record>>,
    /// Keyed tables maintained by resolution, one row per key.
    keyed: HashMap<TableName, BTreeMap<Value, Record>>,
}

/// In-memory transactional table store.
///
/// [`MemoryStore`] keeps both layers in memory: raw logs as plain vectors
/// and resolved tables as key-ordered maps. It is the development and test
/// stand-in for a real transactional table engine, and the reference for the
/// semantics one must provide: atomic writes, one row per key, and at most
/// one in-flight transaction per keyed table.
///
/// Cloning is cheap and clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    /// Per-table transaction slots for keyed tables.
    transaction_slots: Arc<Mutex<HashMap<TableName, Arc<Mutex<()>>>>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the table's exclusive transaction slot, waiting if necessary.
    ///
    /// While the returned guard is held, merge and append transactions
    /// against the table abort with `TransactionConflict` instead of
    /// queueing. Used to serialize external maintenance with resolution, and
    /// by tests to provoke conflicts deterministically.
    pub async fn acquire_transaction_slot(&self, table: &TableName) -> OwnedMutexGuard<()> {
        self.transaction_slot(table).await.lock_owned().await
    }

    async fn transaction_slot(&self, table: &TableName) -> Arc<Mutex<()>> {
        let mut slots = self.transaction_slots.lock().await;
        slots.entry(table.clone()).or_default().clone()
    }

    /// Tries to take the slot without waiting, as a transaction does.
    async fn try_transaction_slot(&self, table: &TableName) -> StrataResult<OwnedMutexGuard<()>> {
        self.transaction_slot(table)
            .await
            .try_lock_owned()
            .map_err(|_| {
                strata_error!(
                    ErrorKind::TransactionConflict,
                    "Another transaction is in flight for this table",
                    table.to_string()
                )
            })
    }
}

impl TableStore for MemoryStore {
    async fn append_rows(&self, table: &TableName, rows: Vec<Record>) -> StrataResult<()> {
        let mut inner = self.inner.lock().await;
        inner.logs.entry(table.clone()).or_default().extend(rows);
        Ok(())
    }

    async fn scan_log(&self, table: &TableName) -> StrataResult<Vec<Record>> {
        let inner = self.inner.lock().await;
        Ok(inner.logs.get(table).cloned().unwrap_or_default())
    }

    async fn apply_merge(&self, table: &TableName, plan: MergePlan) -> StrataResult<MergeOutcome> {
        let _slot = self.try_transaction_slot(table).await?;

        // A plan naming a key twice would make the outcome depend on action
        // order and could leave two rows for one key upstream. Resolution
        // guarantees uniqueness, so seeing one is a logic defect.
        let mut keys = BTreeSet::new();
        for (key, _) in &plan {
            if !keys.insert(key.clone()) {
                bail!(
                    ErrorKind::ConstraintViolation,
                    "Merge plan names the same business key more than once",
                    format!("table {table}, key {key}")
                );
            }
        }

        let mut inner = self.inner.lock().await;
        let table_rows = inner.keyed.entry(table.clone()).or_default();

        let mut outcome = MergeOutcome::default();
        for (key, action) in plan {
            match action {
                RowAction::Upsert(row) => {
                    if table_rows.insert(key, row).is_some() {
                        outcome.updated += 1;
                    } else {
                        outcome.inserted += 1;
                    }
                }
                RowAction::Delete => {
                    if table_rows.remove(&key).is_some() {
                        outcome.deleted += 1;
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn append_new_keys(
        &self,
        table: &TableName,
        key_column: &str,
        rows: Vec<Record>,
    ) -> StrataResult<usize> {
        let _slot = self.try_transaction_slot(table).await?;

        // Validate before mutating so a bad row aborts the whole
        // transaction with nothing applied.
        let mut keyed_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let key = match row.get(key_column) {
                Some(value) if !value.is_null() => value.clone(),
                _ => {
                    bail!(
                        ErrorKind::InvalidData,
                        "Row has no value for the key column",
                        format!("table {table}, key column `{key_column}`")
                    );
                }
            };
            keyed_rows.push((key, row));
        }

        let mut inner = self.inner.lock().await;
        let table_rows = inner.keyed.entry(table.clone()).or_default();

        let mut inserted = 0;
        for (key, row) in keyed_rows {
            if let std::collections::btree_map::Entry::Vacant(entry) = table_rows.entry(key) {
                entry.insert(row);
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn keyed_rows(&self, table: &TableName) -> StrataResult<BTreeMap<Value, Record>> {
        let inner = self.inner.lock().await;
        Ok(inner.keyed.get(table).cloned().unwrap_or_default())
    }
}
