use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::{EntityConfig, ValidationError};

/// Default pause between polls when a source has no new payloads.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default pause between resolution runs per entity.
const DEFAULT_RESOLVE_INTERVAL_MS: u64 = 10_000;

/// Location of the landed change-event files and of the landing checkpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root directory under which the upstream batcher writes per-topic
    /// NDJSON part files.
    pub landing_root: String,
    /// Directory where per-topic landing checkpoints are persisted.
    pub checkpoint_dir: String,
    /// Pause between polls, in milliseconds, when a source is drained.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Top-level configuration for the ingestor service.
///
/// One landing pipeline is started per entity; resolution runs for every
/// entity on a shared interval.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestorConfig {
    /// Where change events are discovered and checkpoints are kept.
    pub source: SourceConfig,
    /// Pause between resolution runs, in milliseconds.
    #[serde(default = "default_resolve_interval_ms")]
    pub resolve_interval_ms: u64,
    /// The entities this service ingests.
    pub entities: Vec<EntityConfig>,
}

impl IngestorConfig {
    /// Validates the ingestor configuration and every entity in it.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entities.is_empty() {
            return Err(ValidationError::NoEntities);
        }

        if self.source.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.poll_interval_ms".to_owned(),
                constraint: "must be greater than 0".to_owned(),
            });
        }

        if self.resolve_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "resolve_interval_ms".to_owned(),
                constraint: "must be greater than 0".to_owned(),
            });
        }

        let mut names = HashSet::new();
        for entity in &self.entities {
            if !names.insert(entity.name.as_str()) {
                return Err(ValidationError::DuplicateEntityName(entity.name.clone()));
            }

            entity.validate()?;
        }

        Ok(())
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_resolve_interval_ms() -> u64 {
    DEFAULT_RESOLVE_INTERVAL_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{EntityKind, FieldConfig, FieldKind};

    fn config() -> IngestorConfig {
        IngestorConfig {
            source: SourceConfig {
                landing_root: "./landing".to_owned(),
                checkpoint_dir: "./checkpoints".to_owned(),
                poll_interval_ms: 500,
            },
            resolve_interval_ms: 5_000,
            entities: vec![EntityConfig {
                name: "stock_item".to_owned(),
                source_topic: "cdc.warehouse.stock_item".to_owned(),
                kind: EntityKind::Mutable,
                key_column: "item_id".to_owned(),
                fields: vec![FieldConfig::required("item_id", FieldKind::Int)],
                raw_table: None,
                resolved_table: None,
            }],
        }
    }

    #[test]
    fn accepts_valid_config() {
        config().validate().unwrap();
    }

    #[test]
    fn rejects_duplicate_entity_names() {
        let mut config = config();
        config.entities.push(config.entities[0].clone());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::DuplicateEntityName(_))
        ));
    }

    #[test]
    fn rejects_empty_entities() {
        let mut config = config();
        config.entities.clear();
        assert!(matches!(config.validate(), Err(ValidationError::NoEntities)));
    }
}
