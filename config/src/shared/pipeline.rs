use serde::{Deserialize, Serialize};

use crate::shared::{EntityConfig, ValidationError};

/// Default pause between polls when the source has no new payloads.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Configuration for one entity's landing pipeline.
///
/// A pipeline binds an entity to a source and runs its landing loop
/// independently of every other entity. The id isolates pipelines in logs
/// when several run in one process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The unique identifier for this pipeline.
    pub id: u64,
    /// The entity this pipeline lands and resolves.
    pub entity: EntityConfig,
    /// Pause between polls, in milliseconds, when the source is drained.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl PipelineConfig {
    /// Validates the pipeline configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "poll_interval_ms".to_owned(),
                constraint: "must be greater than 0".to_owned(),
            });
        }

        self.entity.validate()
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
