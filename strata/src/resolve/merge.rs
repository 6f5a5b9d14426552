use std::collections::btree_map::{BTreeMap, Entry};

use config::shared::EntityConfig;
use tracing::info;

use crate::error::StrataResult;
use crate::resolve::newer_than;
use crate::store::{MergeOutcome, MergePlan, RowAction, TableStore};
use crate::types::{ChangeEvent, LAST_UPDATED_COLUMN, Record, TableName, Value};

/// Collapses raw change events to at most one action per business key.
///
/// For every key the event with the greatest arrival timestamp wins; equal
/// arrivals fall back to the deterministic tie-break in
/// [`newer_than`](crate::resolve::newer_than). The winner maps to a delete
/// when it is a tombstone, and to an upsert of its business attributes plus
/// `_last_updated` otherwise. Whether an upsert inserts or overwrites is
/// decided by the store against the current table contents.
pub fn plan_merge(events: Vec<ChangeEvent>) -> MergePlan {
    let mut winners: BTreeMap<Value, ChangeEvent> = BTreeMap::new();
    for event in events {
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
        .into_iter()
        .map(|(key, event)| {
            let action = if event.is_tombstone() {
                RowAction::Delete
            } else {
                resolved_row(event)
            };
            (key, action)
        })
        .collect()
}

/// Builds the current-state row for a winning non-tombstone event.
fn resolved_row(event: ChangeEvent) -> RowAction {
    let ingested_at = event.ingested_at;
    let mut row: Record = event.into_attributes();
    row.set(LAST_UPDATED_COLUMN, Value::TimestampTz(ingested_at));
    RowAction::Upsert(row)
}

/// Resolves a mutable entity's raw log into its current-state table.
///
/// Reads the full accumulated raw log, plans one action per key, and applies
/// the plan as a single transaction. Running it again over an unchanged log
/// applies the same plan and leaves the table identical, which is what makes
/// at-least-once scheduling safe.
pub async fn resolve_mutable<T: TableStore>(
    store: &T,
    entity: &EntityConfig,
) -> StrataResult<MergeOutcome> {
    let raw_table = TableName::parse(&entity.raw_table())?;
    let target_table = TableName::parse(&entity.resolved_table())?;

    let raw_rows = store.scan_log(&raw_table).await?;
    let mut events = Vec::with_capacity(raw_rows.len());
    for row in raw_rows {
        events.push(ChangeEvent::from_record(row, &entity.key_column)?);
    }

    let plan = plan_merge(events);
    let keys_resolved = plan.len();
    let outcome = store.apply_merge(&target_table, plan).await?;

    info!(
        entity = %entity.name,
        keys_resolved,
        inserted = outcome.inserted,
        updated = outcome.updated,
        deleted = outcome.deleted,
        "merged change events into current state"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::types::{DELETED_COLUMN, INGESTION_TS_COLUMN, OP_COLUMN, SOURCE_TS_COLUMN};

    fn event(key: i64, qty: i64, op: &str, arrival_secs: u32, source_ts: i64) -> ChangeEvent {
        let mut record = Record::new();
        record.set("item_id", Value::I64(key));
        record.set("qty", Value::I64(qty));
        record.set(OP_COLUMN, Value::String(op.to_owned()));
        record.set(SOURCE_TS_COLUMN, Value::I64(source_ts));
        record.set(
            DELETED_COLUMN,
            Value::String(if op == "d" { "true" } else { "false" }.to_owned()),
        );
        record.set(
            INGESTION_TS_COLUMN,
            Value::TimestampTz(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, arrival_secs).unwrap()),
        );
        ChangeEvent::from_record(record, "item_id").unwrap()
    }

    #[test]
    fn latest_arrival_wins_per_key() {
        let plan = plan_merge(vec![
            event(42, 10, "c", 1, 100),
            event(42, 7, "u", 2, 200),
            event(7, 1, "c", 1, 100),
        ]);

        assert_eq!(plan.len(), 2);
        let action = &plan.iter().find(|(key, _)| *key == Value::I64(42)).unwrap().1;
        let RowAction::Upsert(row) = action else {
            panic!("expected upsert, got {action:?}");
        };
        assert_eq!(row.get("qty"), Some(&Value::I64(7)));
    }

    #[test]
    fn tombstone_wins_when_it_arrives_last() {
        let plan = plan_merge(vec![
            event(42, 10, "c", 1, 100),
            event(42, 7, "u", 2, 200),
            event(42, 0, "d", 3, 300),
        ]);

        assert_eq!(plan, vec![(Value::I64(42), RowAction::Delete)]);
    }

    #[test]
    fn equal_arrivals_fall_back_to_source_timestamp() {
        // Same arrival second; the greater source-side timestamp must win.
        let plan = plan_merge(vec![
            event(42, 1, "u", 5, 100),
            event(42, 2, "u", 5, 200),
            event(42, 3, "u", 5, 150),
        ]);

        let RowAction::Upsert(row) = &plan[0].1 else {
            panic!("expected upsert");
        };
        assert_eq!(row.get("qty"), Some(&Value::I64(2)));
    }

    #[test]
    fn tie_break_is_order_independent() {
        let forwards = plan_merge(vec![event(42, 1, "u", 5, 100), event(42, 2, "u", 5, 100)]);
        let backwards = plan_merge(vec![event(42, 2, "u", 5, 100), event(42, 1, "u", 5, 100)]);
        assert_eq!(forwards, backwards);
    }

    #[test]
    fn upsert_rows_carry_last_updated_not_metadata() {
        let plan = plan_merge(vec![event(42, 10, "c", 1, 100)]);
        let RowAction::Upsert(row) = &plan[0].1 else {
            panic!("expected upsert");
        };
        assert!(row.get(LAST_UPDATED_COLUMN).is_some());
        assert!(row.get(OP_COLUMN).is_none());
        assert!(row.get(INGESTION_TS_COLUMN).is_none());
    }
}
