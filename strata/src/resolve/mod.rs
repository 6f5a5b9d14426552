//! State resolution: collapsing raw change events into resolved tables.
//!
//! Resolution runs once per trigger over the full accumulated raw log of an
//! entity and applies its effects as a single transaction against the
//! target table. Mutable entities get last-write-wins upsert/delete
//! semantics ([`merge`]); append-only entities get deduplicated write-once
//! rows ([`append`]). Both are idempotent over an unchanged log, which is
//! what at-least-once scheduling relies on.

pub mod append;
pub mod merge;

use config::shared::{EntityConfig, EntityKind};

use crate::error::StrataResult;
use crate::store::{MergeOutcome, TableStore};
use crate::types::ChangeEvent;

pub use append::{plan_append, resolve_append_only};
pub use merge::{plan_merge, resolve_mutable};

/// Outcome of resolving one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// A mutable entity was merged.
    Merged(MergeOutcome),
    /// An append-only entity received this many new rows.
    Appended(usize),
}

impl ResolutionOutcome {
    /// Number of rows the resolution actually changed.
    pub fn rows_affected(&self) -> usize {
        match self {
            ResolutionOutcome::Merged(outcome) => outcome.keys_affected(),
            ResolutionOutcome::Appended(inserted) => *inserted,
        }
    }
}

/// Resolves one entity according to its configured kind.
pub async fn resolve_entity<T: TableStore>(
    store: &T,
    entity: &EntityConfig,
) -> StrataResult<ResolutionOutcome> {
    match entity.kind {
        EntityKind::Mutable => Ok(ResolutionOutcome::Merged(
            resolve_mutable(store, entity).await?,
        )),
        EntityKind::AppendOnly => Ok(ResolutionOutcome::Appended(
            resolve_append_only(store, entity).await?,
        )),
    }
}

/// Returns true if `candidate` should replace `incumbent` as the winning
/// event for a key.
///
/// Arrival time decides; equal arrivals (possible because a whole landed
/// batch shares one arrival timestamp) fall back to the source-side
/// timestamp, and as a last resort to the canonical encoding of the full
/// record. The fallbacks carry no business meaning, they only make the
/// choice independent of the order events were read in.
pub(crate) fn newer_than(candidate: &ChangeEvent, incumbent: &ChangeEvent) -> bool {
    let candidate_rank = (
        candidate.ingested_at,
        candidate.source_ts_ms,
        candidate.record.canonical_encoding(),
    );
    let incumbent_rank = (
        incumbent.ingested_at,
        incumbent.source_ts_ms,
        incumbent.record.canonical_encoding(),
    );

    candidate_rank > incumbent_rank
}
