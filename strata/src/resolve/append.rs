use std::collections::btree_map::{BTreeMap, Entry};

use config::shared::EntityConfig;
use tracing::info;

use crate::error::StrataResult;
use crate::resolve::newer_than;
use crate::store::TableStore;
use crate::types::{ChangeEvent, INGESTED_AT_COLUMN, Record, TableName, Value};

/// Plans the rows to append for an immutable-event entity.
///
/// Tombstones are dropped: once recorded, an event is never deleted by this
/// pipeline. The remainder is deduplicated by event id; the payload of a
/// given id is identical across duplicates under the source's guarantees, so
/// the pick among them is arbitrary, but it reuses the arrival-order
/// comparator to stay deterministic. Each planned row carries the business
/// attributes plus `_ingested_at`.
pub fn plan_append(events: Vec<ChangeEvent>) -> Vec<Record> {
    let mut winners: BTreeMap<Value, ChangeEvent> = BTreeMap::new();
    for event in events {
        if event.is_tombstone() {
            continue;
        }

        match winners.entry(event.key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(event);
            }
            Entry::Occupied(mut slot) => {
                if newer_than(&event, slot.get()) {
                    slot.insert(event);
                }
            }
        }
    }

    winners
        .into_values()
        .map(|event| {
            let ingested_at = event.ingested_at;
            let mut row = event.into_attributes();
            row.set(INGESTED_AT_COLUMN, Value::TimestampTz(ingested_at));
            row
        })
        .collect()
}

/// Resolves an append-only entity's raw log into its immutable-event table.
///
/// Reads the full accumulated raw log, plans the deduplicated rows, and
/// inserts only those whose event id is not yet present, as one transaction.
/// Existing rows are never touched, so re-running over an unchanged log
/// inserts nothing.
pub async fn resolve_append_only<T: TableStore>(
    store: &T,
    entity: &EntityConfig,
) -> StrataResult<usize> {
    let raw_table = TableName::parse(&entity.raw_table())?;
    let target_table = TableName::parse(&entity.resolved_table())?;

    let raw_rows = store.scan_log(&raw_table).await?;
    let mut events = Vec::with_capacity(raw_rows.len());
    for row in raw_rows {
        events.push(ChangeEvent::from_record(row, &entity.key_column)?);
    }

    let rows = plan_append(events);
    let candidates = rows.len();
    let inserted = store
        .append_new_keys(&target_table, &entity.key_column, rows)
        .await?;

    info!(
        entity = %entity.name,
        candidates,
        inserted,
        "appended new immutable events"
    );

    Ok(inserted)
}
