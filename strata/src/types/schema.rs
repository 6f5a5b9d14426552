use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use config::shared::{EntityConfig, FieldKind};
use serde_json::Value as JsonValue;

use crate::error::{ErrorKind, StrataResult};
use crate::strata_error;
use crate::types::event::{DELETED_COLUMN, OP_COLUMN, SOURCE_TS_COLUMN};
use crate::types::record::Record;
use crate::types::value::Value;

/// Storage type of a schema field, mirroring the [`Value`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    I64,
    F64,
    String,
    TimestampTz,
    Json,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::I64 => "int",
            FieldType::F64 => "float",
            FieldType::String => "string",
            FieldType::TimestampTz => "timestamp",
            FieldType::Json => "json",
        };
        f.write_str(name)
    }
}

impl From<FieldKind> for FieldType {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Bool => FieldType::Bool,
            FieldKind::Int => FieldType::I64,
            FieldKind::Float => FieldType::F64,
            FieldKind::String => FieldType::String,
            FieldKind::Timestamp => FieldType::TimestampTz,
            FieldKind::Json => FieldType::Json,
        }
    }
}

/// One field of an entity schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

/// The landing schema of one entity.
///
/// Built from the declared fields in [`EntityConfig`] plus the CDC metadata
/// fields every payload carries. The schema widens additively at landing
/// time: a payload field it has never seen is added with an inferred type,
/// it is never removed and its type is never changed afterwards.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    fields: Vec<FieldSchema>,
    index: HashMap<String, usize>,
}

impl EntitySchema {
    /// Builds the landing schema for an entity.
    ///
    /// The CDC metadata fields (`__op`, `__source_ts_ms`, `__deleted`) are
    /// appended as nullable fields unless the entity declares them itself.
    pub fn for_entity(entity: &EntityConfig) -> Self {
        let mut schema = Self {
            fields: Vec::with_capacity(entity.fields.len() + 3),
            index: HashMap::new(),
        };

        for field in &entity.fields {
            schema.push_field(FieldSchema {
                name: field.name.clone(),
                field_type: field.kind.into(),
                nullable: field.nullable,
            });
        }

        for (name, field_type) in [
            (OP_COLUMN, FieldType::String),
            (SOURCE_TS_COLUMN, FieldType::I64),
            (DELETED_COLUMN, FieldType::String),
        ] {
            if !schema.index.contains_key(name) {
                schema.push_field(FieldSchema {
                    name: name.to_owned(),
                    field_type,
                    nullable: true,
                });
            }
        }

        schema
    }

    /// Returns the fields in declaration order, widened fields last.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.index.get(name).map(|&position| &self.fields[position])
    }

    /// Coerces one source payload into a [`Record`] under this schema.
    ///
    /// Declared fields are coerced to their declared types; a value that
    /// cannot be coerced, or a missing value for a non-nullable field, is a
    /// `SchemaViolation`. Payload fields the schema has never seen are
    /// widened in with an inferred type and landed as well, so a source may
    /// start emitting new columns without failing the pipeline.
    pub fn coerce_payload(&mut self, payload: &JsonValue) -> StrataResult<Record> {
        let Some(object) = payload.as_object() else {
            return Err(strata_error!(
                ErrorKind::SchemaViolation,
                "Payload is not a JSON object",
                payload
            ));
        };

        let mut record = Record::new();

        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(JsonValue::Null) => {
                    if !field.nullable {
                        return Err(strata_error!(
                            ErrorKind::SchemaViolation,
                            "Missing value for non-nullable field",
                            format!("field `{}` is required but absent or null", field.name)
                        ));
                    }
                    record.set(field.name.clone(), Value::Null);
                }
                Some(value) => {
                    record.set(field.name.clone(), coerce_value(&field.name, field.field_type, value)?);
                }
            }
        }

        for (name, value) in object {
            if self.index.contains_key(name) {
                continue;
            }

            // Widening is deferred for null values: there is nothing to
            // infer a type from yet.
            if value.is_null() {
                record.set(name.clone(), Value::Null);
                continue;
            }

            let field_type = infer_field_type(value);
            self.push_field(FieldSchema {
                name: name.clone(),
                field_type,
                nullable: true,
            });
            record.set(name.clone(), coerce_value(name, field_type, value)?);
        }

        Ok(record)
    }

    fn push_field(&mut self, field: FieldSchema) {
        self.index.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
    }
}

/// Infers the storage type for a widened field from its first non-null value.
fn infer_field_type(value: &JsonValue) -> FieldType {
    match value {
        JsonValue::Bool(_) => FieldType::Bool,
        JsonValue::Number(number) => {
            if number.as_i64().is_some() {
                FieldType::I64
            } else {
                FieldType::F64
            }
        }
        JsonValue::String(_) => FieldType::String,
        JsonValue::Array(_) | JsonValue::Object(_) => FieldType::Json,
        JsonValue::Null => FieldType::Json,
    }
}

/// Coerces one JSON value to the given field type.
fn coerce_value(name: &str, field_type: FieldType, value: &JsonValue) -> StrataResult<Value> {
    let coerced = match field_type {
        FieldType::Bool => match value {
            JsonValue::Bool(value) => Some(Value::Bool(*value)),
            JsonValue::String(value) => match value.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldType::I64 => value.as_i64().map(Value::I64),
        FieldType::F64 => value.as_f64().map(Value::F64),
        FieldType::String => value.as_str().map(|value| Value::String(value.to_owned())),
        FieldType::TimestampTz => coerce_timestamp(value),
        FieldType::Json => Some(Value::Json(value.clone())),
    };

    coerced.ok_or_else(|| {
        strata_error!(
            ErrorKind::SchemaViolation,
            "Payload value does not match the declared field type",
            format!("field `{name}` expects {field_type}, got `{value}`")
        )
    })
}

/// Timestamps arrive either as RFC 3339 strings or as epoch milliseconds.
fn coerce_timestamp(value: &JsonValue) -> Option<Value> {
    match value {
        JsonValue::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|parsed| Value::TimestampTz(parsed.with_timezone(&Utc))),
        JsonValue::Number(number) => number
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(Value::TimestampTz),
        _ => None,
    }
}
