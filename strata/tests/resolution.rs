mod support;

use std::time::Duration;

use strata::error::ErrorKind;
use strata::landing::Landing;
use strata::pipeline::Pipeline;
use strata::resolve::{ResolutionOutcome, resolve_append_only, resolve_entity, resolve_mutable};
use strata::source::MemorySource;
use strata::store::{MemoryStore, TableStore};
use strata::types::{LAST_UPDATED_COLUMN, TableName, Value};
use telemetry::tracing::init_test_tracing;

use crate::support::{
    item_payload, movement_payload, pipeline_config, stock_item_entity, stock_movement_entity,
};

fn silver_items() -> TableName {
    TableName::new("silver", "stock_item")
}

fn silver_movements() -> TableName {
    TableName::new("silver", "stock_movement")
}

/// Lands each batch separately so arrival timestamps are strictly ordered.
async fn land_batches(
    entity: config::shared::EntityConfig,
    store: &MemoryStore,
    batches: Vec<Vec<serde_json::Value>>,
) {
    let source = MemorySource::new();
    for batch in batches {
        source.push_batch(batch).await;
    }

    let mut landing = Landing::new(&pipeline_config(entity), source, store.clone()).unwrap();
    landing.land_available().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn last_write_wins_by_arrival_time() {
    init_test_tracing();

    let store = MemoryStore::new();
    land_batches(
        stock_item_entity(),
        &store,
        vec![
            vec![item_payload(42, 10, "c", 100)],
            vec![item_payload(42, 7, "u", 200)],
        ],
    )
    .await;

    resolve_mutable(&store, &stock_item_entity()).await.unwrap();

    let rows = store.keyed_rows(&silver_items()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[&Value::I64(42)];
    assert_eq!(row.get("initial_qty"), Some(&Value::I64(7)));
    assert!(row.get(LAST_UPDATED_COLUMN).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn tombstone_removes_the_current_state_row() {
    init_test_tracing();

    // The raw log for item 42: create qty 10, update qty 7, then delete.
    let store = MemoryStore::new();
    land_batches(
        stock_item_entity(),
        &store,
        vec![
            vec![item_payload(42, 10, "c", 100)],
            vec![item_payload(42, 7, "u", 200)],
            vec![item_payload(42, 0, "d", 300)],
        ],
    )
    .await;

    let outcome = resolve_mutable(&store, &stock_item_entity()).await.unwrap();

    let rows = store.keyed_rows(&silver_items()).await.unwrap();
    assert!(rows.is_empty());
    // The delete of a row that was never inserted is a no-op.
    assert_eq!(outcome.keys_affected(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_then_insert_revives_the_key() {
    init_test_tracing();

    let store = MemoryStore::new();
    land_batches(
        stock_item_entity(),
        &store,
        vec![
            vec![item_payload(42, 10, "c", 100)],
            vec![item_payload(42, 0, "d", 200)],
            vec![item_payload(42, 33, "c", 300)],
        ],
    )
    .await;

    resolve_mutable(&store, &stock_item_entity()).await.unwrap();

    let rows = store.keyed_rows(&silver_items()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[&Value::I64(42)].get("initial_qty"),
        Some(&Value::I64(33))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn resolving_an_unchanged_log_twice_is_idempotent() {
    init_test_tracing();

    let store = MemoryStore::new();
    land_batches(
        stock_item_entity(),
        &store,
        vec![
            vec![item_payload(1, 10, "c", 100), item_payload(2, 20, "c", 101)],
            vec![item_payload(1, 11, "u", 102), item_payload(3, 30, "c", 103)],
        ],
    )
    .await;
    land_batches(
        stock_movement_entity(),
        &store,
        vec![vec![
            movement_payload(900, 1, 5),
            movement_payload(901, 2, 3),
        ]],
    )
    .await;

    resolve_mutable(&store, &stock_item_entity()).await.unwrap();
    let items_after_first = store.keyed_rows(&silver_items()).await.unwrap();

    let inserted = resolve_append_only(&store, &stock_movement_entity())
        .await
        .unwrap();
    assert_eq!(inserted, 2);
    let movements_after_first = store.keyed_rows(&silver_movements()).await.unwrap();

    // Second pass over the unchanged logs: identical tables, nothing inserted.
    resolve_mutable(&store, &stock_item_entity()).await.unwrap();
    let inserted = resolve_append_only(&store, &stock_movement_entity())
        .await
        .unwrap();

    assert_eq!(inserted, 0);
    assert_eq!(
        store.keyed_rows(&silver_items()).await.unwrap(),
        items_after_first
    );
    assert_eq!(
        store.keyed_rows(&silver_movements()).await.unwrap(),
        movements_after_first
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn at_most_one_row_per_key_after_resolution() {
    init_test_tracing();

    let store = MemoryStore::new();
    let mut batches = Vec::new();
    for round in 0..5i64 {
        batches.push(vec![
            item_payload(1, round, "u", round * 10),
            item_payload(2, round * 2, "u", round * 10 + 1),
            item_payload(3, round * 3, "u", round * 10 + 2),
        ]);
    }
    land_batches(stock_item_entity(), &store, batches).await;

    resolve_mutable(&store, &stock_item_entity()).await.unwrap();

    let rows = store.keyed_rows(&silver_items()).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[&Value::I64(1)].get("initial_qty"), Some(&Value::I64(4)));
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_movements_across_batches_insert_once() {
    init_test_tracing();

    // The same movement payload lands in two separate batches.
    let store = MemoryStore::new();
    land_batches(
        stock_movement_entity(),
        &store,
        vec![
            vec![movement_payload(900, 1, 5)],
            vec![movement_payload(900, 1, 5)],
        ],
    )
    .await;

    let inserted = resolve_append_only(&store, &stock_movement_entity())
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let rows = store.keyed_rows(&silver_movements()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[&Value::I64(900)].get("qty"), Some(&Value::I64(5)));
}

#[tokio::test(flavor = "multi_thread")]
async fn movements_are_never_updated_by_later_duplicates() {
    init_test_tracing();

    let store = MemoryStore::new();
    land_batches(
        stock_movement_entity(),
        &store,
        vec![vec![movement_payload(900, 1, 5)]],
    )
    .await;
    resolve_append_only(&store, &stock_movement_entity())
        .await
        .unwrap();
    let before = store.keyed_rows(&silver_movements()).await.unwrap();

    // A later arrival of the same id, even with drifted attributes, must
    // not touch the existing row.
    land_batches(
        stock_movement_entity(),
        &store,
        vec![vec![movement_payload(900, 1, 99)]],
    )
    .await;
    let inserted = resolve_append_only(&store, &stock_movement_entity())
        .await
        .unwrap();

    assert_eq!(inserted, 0);
    assert_eq!(store.keyed_rows(&silver_movements()).await.unwrap(), before);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_resolution_conflicts_and_later_retry_succeeds() {
    init_test_tracing();

    let store = MemoryStore::new();
    land_batches(
        stock_item_entity(),
        &store,
        vec![vec![item_payload(1, 10, "c", 100)]],
    )
    .await;

    let slot = store.acquire_transaction_slot(&silver_items()).await;
    let err = resolve_mutable(&store, &stock_item_entity())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionConflict);

    // The losing attempt had no partial effect.
    assert!(store.keyed_rows(&silver_items()).await.unwrap().is_empty());

    drop(slot);
    let outcome = resolve_mutable(&store, &stock_item_entity()).await.unwrap();
    assert_eq!(outcome.inserted, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn resolution_tolerates_a_still_growing_log() {
    init_test_tracing();

    let store = MemoryStore::new();
    land_batches(
        stock_item_entity(),
        &store,
        vec![vec![item_payload(42, 10, "c", 100)]],
    )
    .await;
    resolve_mutable(&store, &stock_item_entity()).await.unwrap();

    // More events land after the first resolution pass.
    land_batches(
        stock_item_entity(),
        &store,
        vec![vec![item_payload(42, 7, "u", 200)]],
    )
    .await;
    resolve_mutable(&store, &stock_item_entity()).await.unwrap();

    let rows = store.keyed_rows(&silver_items()).await.unwrap();
    assert_eq!(rows[&Value::I64(42)].get("initial_qty"), Some(&Value::I64(7)));
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_lands_and_resolves_end_to_end() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .push_batch(vec![
            item_payload(1, 10, "c", 100),
            item_payload(2, 20, "c", 101),
        ])
        .await;
    source.push_batch(vec![item_payload(2, 0, "d", 102)]).await;

    let store = MemoryStore::new();
    let mut pipeline = Pipeline::new(
        1,
        pipeline_config(stock_item_entity()),
        source.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();

    // Wait until the landing worker has drained both batches.
    let raw_table = TableName::new("bronze", "stock_item");
    for _ in 0..100 {
        if store.scan_log(&raw_table).await.unwrap().len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.scan_log(&raw_table).await.unwrap().len(), 3);

    let outcome = pipeline.resolve().await.unwrap();
    let ResolutionOutcome::Merged(merged) = outcome else {
        panic!("expected a merge outcome, got {outcome:?}");
    };
    assert_eq!(merged.inserted, 1);

    let stats = pipeline.shutdown_and_wait().await.unwrap();
    assert_eq!(stats.batches_landed, 2);

    let rows = store.keyed_rows(&silver_items()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows.contains_key(&Value::I64(1)));
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_entity_dispatches_on_kind() {
    init_test_tracing();

    let store = MemoryStore::new();
    land_batches(
        stock_item_entity(),
        &store,
        vec![vec![item_payload(1, 10, "c", 100)]],
    )
    .await;
    land_batches(
        stock_movement_entity(),
        &store,
        vec![vec![movement_payload(900, 1, 5)]],
    )
    .await;

    let merged = resolve_entity(&store, &stock_item_entity()).await.unwrap();
    assert!(matches!(merged, ResolutionOutcome::Merged(_)));
    assert_eq!(merged.rows_affected(), 1);

    let appended = resolve_entity(&store, &stock_movement_entity())
        .await
        .unwrap();
    assert_eq!(appended, ResolutionOutcome::Appended(1));
}
