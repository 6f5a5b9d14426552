use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{ErrorKind, StrataResult};
use crate::strata_error;
use crate::types::record::Record;
use crate::types::value::Value;

/// CDC operation tag column emitted by the source.
pub const OP_COLUMN: &str = "__op";

/// Source-side event time in epoch milliseconds.
pub const SOURCE_TS_COLUMN: &str = "__source_ts_ms";

/// Deletion flag column, a `"true"`/`"false"` string on the wire.
pub const DELETED_COLUMN: &str = "__deleted";

/// Arrival timestamp stamped by the landing stage on every raw log row.
pub const INGESTION_TS_COLUMN: &str = "ingestion_timestamp";

/// Resolution timestamp column on current-state tables.
pub const LAST_UPDATED_COLUMN: &str = "_last_updated";

/// Landing timestamp column on immutable-event tables.
pub const INGESTED_AT_COLUMN: &str = "_ingested_at";

/// Operation tag of a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
    /// Any tag this pipeline does not interpret, such as snapshot reads.
    Other,
}

impl ChangeOp {
    /// Maps the wire tag (`"c"`, `"u"`, `"d"`, ...) onto an operation.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "c" => ChangeOp::Create,
            "u" => ChangeOp::Update,
            "d" => ChangeOp::Delete,
            _ => ChangeOp::Other,
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeOp::Create => f.write_str("create"),
            ChangeOp::Update => f.write_str("update"),
            ChangeOp::Delete => f.write_str("delete"),
            ChangeOp::Other => f.write_str("other"),
        }
    }
}

/// Typed view over one raw log row, as consumed by state resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Business key (mutable entities) or event id (append-only entities).
    pub key: Value,
    /// Operation tag from the source.
    pub op: ChangeOp,
    /// Deletion flag from the source.
    pub deleted: bool,
    /// Source-side event time in epoch milliseconds, when present.
    pub source_ts_ms: Option<i64>,
    /// Arrival time stamped at landing.
    pub ingested_at: DateTime<Utc>,
    /// The full landed record, metadata columns included.
    pub record: Record,
}

impl ChangeEvent {
    /// Builds a change event from a landed raw log record.
    ///
    /// The record must carry a non-null key column and the arrival timestamp
    /// the landing stage stamps on every row; anything else is tolerated and
    /// defaulted (an absent `__op` is [`ChangeOp::Other`], an absent
    /// `__deleted` means not deleted).
    pub fn from_record(record: Record, key_column: &str) -> StrataResult<Self> {
        let key = match record.get(key_column) {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                return Err(strata_error!(
                    ErrorKind::InvalidData,
                    "Raw log record has no business key",
                    format!("key column `{key_column}` is absent or null")
                ));
            }
        };

        let Some(Value::TimestampTz(ingested_at)) = record.get(INGESTION_TS_COLUMN) else {
            return Err(strata_error!(
                ErrorKind::InvalidData,
                "Raw log record has no arrival timestamp",
                format!("column `{INGESTION_TS_COLUMN}` is absent or not a timestamp")
            ));
        };
        let ingested_at = *ingested_at;

        let op = match record.get(OP_COLUMN) {
            Some(Value::String(tag)) => ChangeOp::from_tag(tag),
            _ => ChangeOp::Other,
        };

        let deleted = matches!(
            record.get(DELETED_COLUMN),
            Some(Value::String(flag)) if flag == "true"
        );

        let source_ts_ms = match record.get(SOURCE_TS_COLUMN) {
            Some(Value::I64(millis)) => Some(*millis),
            _ => None,
        };

        Ok(Self {
            key,
            op,
            deleted,
            source_ts_ms,
            ingested_at,
            record,
        })
    }

    /// Returns true if this event removes its key.
    ///
    /// Either the deletion flag or a delete operation tag marks a tombstone;
    /// the source emits both, but each alone is already authoritative.
    pub fn is_tombstone(&self) -> bool {
        self.deleted || self.op == ChangeOp::Delete
    }

    /// Strips CDC metadata, leaving only the business attributes.
    pub fn into_attributes(self) -> Record {
        let mut attributes = self.record;
        attributes.remove(OP_COLUMN);
        attributes.remove(SOURCE_TS_COLUMN);
        attributes.remove(DELETED_COLUMN);
        attributes.remove(INGESTION_TS_COLUMN);
        attributes
    }
}
