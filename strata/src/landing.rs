//! Raw event landing: the bronze stage.
//!
//! Landing pulls payload batches from an [`EventSource`], coerces them under
//! the entity schema, stamps the arrival timestamp, and appends them to the
//! entity's raw log. The source checkpoint is committed only after the
//! append succeeds, so a batch is either fully landed and committed or will
//! be redelivered on the next run.

use std::time::Duration;

use chrono::Utc;
use config::shared::PipelineConfig;
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, StrataResult};
use crate::source::EventSource;
use crate::store::TableStore;
use crate::strata_error;
use crate::types::{EntitySchema, INGESTION_TS_COLUMN, TableName, Value};

/// Running totals of one landing worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LandingStats {
    pub batches_landed: u64,
    pub events_landed: u64,
}

/// The landing stage for one entity.
///
/// Owns the entity's mutable landing schema: unknown payload fields widen
/// it, and the widened schema applies to every later batch.
#[derive(Debug)]
pub struct Landing<S, T> {
    entity_name: String,
    raw_table: TableName,
    schema: EntitySchema,
    source: S,
    store: T,
}

impl<S, T> Landing<S, T>
where
    S: EventSource,
    T: TableStore,
{
    /// Creates the landing stage from the pipeline configuration.
    pub fn new(config: &PipelineConfig, source: S, store: T) -> StrataResult<Self> {
        let raw_table = TableName::parse(&config.entity.raw_table())?;

        Ok(Self {
            entity_name: config.entity.name.clone(),
            raw_table,
            schema: EntitySchema::for_entity(&config.entity),
            source,
            store,
        })
    }

    /// Lands the next available batch.
    ///
    /// Returns the number of events landed, or `None` when the source is
    /// drained. A payload that fails coercion fails the whole batch before
    /// anything is appended, and the checkpoint does not advance, so the
    /// batch is redelivered once the external runtime retries.
    pub async fn land_next_batch(&mut self) -> StrataResult<Option<usize>> {
        let Some(batch) = self.source.next_batch().await? else {
            return Ok(None);
        };

        // One arrival timestamp per batch: all payloads of a micro-batch
        // are observed at the same instant.
        let ingested_at = Utc::now();

        let mut rows = Vec::with_capacity(batch.payloads.len());
        for payload in &batch.payloads {
            let mut record = self.schema.coerce_payload(payload)?;
            record.set(INGESTION_TS_COLUMN, Value::TimestampTz(ingested_at));
            rows.push(record);
        }

        let landed = rows.len();
        self.store.append_rows(&self.raw_table, rows).await?;
        self.source.commit(batch.position.clone()).await?;

        info!(
            entity = %self.entity_name,
            position = %batch.position,
            events = landed,
            "landed batch"
        );

        Ok(Some(landed))
    }

    /// Lands every batch the source currently has available.
    pub async fn land_available(&mut self) -> StrataResult<LandingStats> {
        let mut stats = LandingStats::default();
        while let Some(landed) = self.land_next_batch().await? {
            stats.batches_landed += 1;
            stats.events_landed += landed as u64;
        }
        Ok(stats)
    }
}

/// Handle for monitoring and joining a landing worker.
#[derive(Debug)]
pub struct LandingWorkerHandle {
    handle: Option<JoinHandle<StrataResult<LandingStats>>>,
}

impl LandingWorkerHandle {
    /// Waits for the landing worker to stop and returns its totals.
    ///
    /// Worker panics surface as errors rather than propagating the panic.
    pub async fn wait(mut self) -> StrataResult<LandingStats> {
        let Some(handle) = self.handle.take() else {
            return Ok(LandingStats::default());
        };

        handle.await.map_err(|err| {
            strata_error!(
                ErrorKind::LandingWorkerPanic,
                "Landing worker panicked",
                err
            )
        })?
    }
}

/// Worker that runs one entity's landing loop until shutdown.
///
/// Batches are landed strictly one at a time, in delivery order; the next
/// batch is not pulled before the previous one's append and checkpoint
/// commit complete. When the source is drained the worker sleeps for the
/// configured poll interval.
#[derive(Debug)]
pub struct LandingWorker<S, T> {
    landing: Landing<S, T>,
    poll_interval: Duration,
    shutdown_rx: ShutdownRx,
}

impl<S, T> LandingWorker<S, T>
where
    S: EventSource + Send + 'static,
    T: TableStore + Send + Sync + 'static,
{
    /// Creates a landing worker from its parts.
    pub fn new(landing: Landing<S, T>, poll_interval: Duration, shutdown_rx: ShutdownRx) -> Self {
        Self {
            landing,
            poll_interval,
            shutdown_rx,
        }
    }

    /// Spawns the worker loop and returns its handle.
    pub fn start(self) -> LandingWorkerHandle {
        let span = info_span!("landing_worker", entity = %self.landing.entity_name);
        let handle = tokio::spawn(self.run().instrument(span));

        LandingWorkerHandle {
            handle: Some(handle),
        }
    }

    async fn run(mut self) -> StrataResult<LandingStats> {
        let mut stats = LandingStats::default();

        loop {
            // A shutdown observed between batches stops the worker at a
            // batch boundary; an in-flight batch always completes.
            if self.shutdown_rx.has_changed().unwrap_or(true) {
                break;
            }

            match self.landing.land_next_batch().await? {
                Some(landed) => {
                    stats.batches_landed += 1;
                    stats.events_landed += landed as u64;
                }
                None => {
                    tokio::select! {
                        _ = self.shutdown_rx.changed() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        info!(
            batches = stats.batches_landed,
            events = stats.events_landed,
            "landing worker stopped"
        );

        Ok(stats)
    }
}
