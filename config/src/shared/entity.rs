use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Database schema holding raw change-event logs.
const RAW_LAYER: &str = "bronze";

/// Database schema holding resolved tables.
const RESOLVED_LAYER: &str = "silver";

/// How the silver layer maintains resolved rows for an entity.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// One current-state row per business key, maintained via upsert/delete.
    Mutable,
    /// Write-once event rows, deduplicated by event id and never rewritten.
    AppendOnly,
}

/// Field types an entity schema can declare.
///
/// These are the coarse types the landing stage coerces payload values into;
/// the core crate maps them onto its cell model.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    String,
    Timestamp,
    Json,
}

/// A single declared field of an entity schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field name as it appears in source payloads.
    pub name: String,
    /// Declared type the payload value is coerced into.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Whether the field may be null or absent in a payload.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

impl FieldConfig {
    /// Creates a nullable field with the given name and kind.
    pub fn nullable(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
        }
    }

    /// Creates a required (non-nullable) field with the given name and kind.
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
        }
    }
}

fn default_nullable() -> bool {
    true
}

/// Configuration for one CDC-sourced entity.
///
/// An entity corresponds to one source table: its change events are landed in
/// a raw log table and resolved into either a current-state table
/// ([`EntityKind::Mutable`]) or an append-only event table
/// ([`EntityKind::AppendOnly`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity name, used as the stem of the default table names.
    pub name: String,
    /// Topic under the landing root where the source emits this entity's events.
    pub source_topic: String,
    /// Resolution mode for the silver layer.
    pub kind: EntityKind,
    /// Business key column (mutable entities) or event id column (append-only).
    pub key_column: String,
    /// Declared payload fields. Fields not declared here are still landed,
    /// with their type inferred, by additive schema widening.
    pub fields: Vec<FieldConfig>,
    /// Raw log table override, defaults to `bronze.<name>`.
    #[serde(default)]
    pub raw_table: Option<String>,
    /// Resolved table override, defaults to `silver.<name>`.
    #[serde(default)]
    pub resolved_table: Option<String>,
}

impl EntityConfig {
    /// Returns the qualified raw log table name for this entity.
    pub fn raw_table(&self) -> String {
        self.raw_table
            .clone()
            .unwrap_or_else(|| format!("{RAW_LAYER}.{}", self.name))
    }

    /// Returns the qualified resolved table name for this entity.
    pub fn resolved_table(&self) -> String {
        self.resolved_table
            .clone()
            .unwrap_or_else(|| format!("{RESOLVED_LAYER}.{}", self.name))
    }

    /// Validates the entity configuration.
    ///
    /// The key column must be one of the declared fields so that resolution
    /// can always extract a business key from a landed record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fields.is_empty() {
            return Err(ValidationError::NoFields(self.name.clone()));
        }

        if !self.fields.iter().any(|field| field.name == self.key_column) {
            return Err(ValidationError::KeyColumnNotDeclared {
                entity: self.name.clone(),
                key_column: self.key_column.clone(),
            });
        }

        Ok(())
    }
}
