//! Shared fixtures for integration tests: the stock entities from the
//! warehouse CDC feed and payload builders for their change events.

// Not every test crate uses every fixture.
#![allow(dead_code)]

use config::shared::{EntityConfig, EntityKind, FieldConfig, FieldKind, PipelineConfig};
use serde_json::{Value as JsonValue, json};

pub fn stock_item_entity() -> EntityConfig {
    EntityConfig {
        name: "stock_item".to_owned(),
        source_topic: "cdc.warehouse.stock_item".to_owned(),
        kind: EntityKind::Mutable,
        key_column: "item_id".to_owned(),
        fields: vec![
            FieldConfig::required("item_id", FieldKind::Int),
            FieldConfig::nullable("sku", FieldKind::String),
            FieldConfig::nullable("name", FieldKind::String),
            FieldConfig::nullable("location_id", FieldKind::Int),
            FieldConfig::nullable("initial_qty", FieldKind::Int),
            FieldConfig::nullable("updated_at", FieldKind::Timestamp),
        ],
        raw_table: None,
        resolved_table: None,
    }
}

pub fn stock_movement_entity() -> EntityConfig {
    EntityConfig {
        name: "stock_movement".to_owned(),
        source_topic: "cdc.warehouse.stock_movement".to_owned(),
        kind: EntityKind::AppendOnly,
        key_column: "movement_id".to_owned(),
        fields: vec![
            FieldConfig::required("movement_id", FieldKind::Int),
            FieldConfig::required("item_id", FieldKind::Int),
            FieldConfig::nullable("type", FieldKind::String),
            FieldConfig::nullable("qty", FieldKind::Int),
            FieldConfig::nullable("ts", FieldKind::Timestamp),
        ],
        raw_table: None,
        resolved_table: None,
    }
}

pub fn pipeline_config(entity: EntityConfig) -> PipelineConfig {
    PipelineConfig {
        id: rand::random(),
        entity,
        poll_interval_ms: 20,
    }
}

/// A stock item change event as the CDC source emits it.
pub fn item_payload(item_id: i64, qty: i64, op: &str, source_ts_ms: i64) -> JsonValue {
    json!({
        "item_id": item_id,
        "sku": format!("WH-{item_id}"),
        "name": format!("item {item_id}"),
        "location_id": 1,
        "initial_qty": qty,
        "updated_at": "2024-03-01T10:00:00Z",
        "__op": op,
        "__source_ts_ms": source_ts_ms,
        "__deleted": if op == "d" { "true" } else { "false" },
    })
}

/// A stock movement event; movements are only ever created.
pub fn movement_payload(movement_id: i64, item_id: i64, qty: i64) -> JsonValue {
    json!({
        "movement_id": movement_id,
        "item_id": item_id,
        "type": "IN",
        "qty": qty,
        "ts": "2024-03-01T10:00:00Z",
        "__op": "c",
        "__source_ts_ms": 1_709_287_200_000i64,
        "__deleted": "false",
    })
}
