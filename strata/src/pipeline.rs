//! Per-entity pipeline orchestration.
//!
//! A [`Pipeline`] binds one entity's source and store together, runs the
//! landing worker in the background, and exposes resolution as an
//! independently triggered operation. Pipelines for different entities
//! share nothing but (optionally) the store handle and run fully in
//! parallel.

use std::sync::Arc;
use std::time::Duration;

use config::shared::PipelineConfig;
use tracing::{error, info};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, StrataResult};
use crate::landing::{Landing, LandingStats, LandingWorker, LandingWorkerHandle};
use crate::resolve::{ResolutionOutcome, resolve_entity};
use crate::source::EventSource;
use crate::store::TableStore;
use crate::strata_error;

/// Identifier of a pipeline, unique within one process.
pub type PipelineId = u64;

#[derive(Debug)]
enum PipelineState<S, T> {
    NotStarted {
        source: S,
        store: T,
    },
    Started {
        landing_worker: LandingWorkerHandle,
        store: T,
    },
}

/// One entity's two-stage pipeline.
#[derive(Debug)]
pub struct Pipeline<S, T> {
    id: PipelineId,
    config: Arc<PipelineConfig>,
    state: Option<PipelineState<S, T>>,
    shutdown_tx: ShutdownTx,
}

impl<S, T> Pipeline<S, T>
where
    S: EventSource + Send + 'static,
    T: TableStore + Clone + Send + Sync + 'static,
{
    /// Creates a pipeline for one entity.
    pub fn new(id: PipelineId, config: PipelineConfig, source: S, store: T) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            id,
            config: Arc::new(config),
            state: Some(PipelineState::NotStarted { source, store }),
            shutdown_tx,
        }
    }

    /// Returns the pipeline id.
    pub fn id(&self) -> PipelineId {
        self.id
    }

    /// Returns a handle that can request shutdown of this pipeline.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Validates the configuration and starts the landing worker.
    pub async fn start(&mut self) -> StrataResult<()> {
        let (source, store) = match self.state.take() {
            Some(PipelineState::NotStarted { source, store }) => (source, store),
            other => {
                self.state = other;
                bail!(
                    ErrorKind::ConfigError,
                    "Pipeline was already started",
                    self.config.entity.name.clone()
                );
            }
        };

        if let Err(err) = self.config.validate() {
            // The source and store are handed back so that a fixed
            // configuration can be retried on a fresh pipeline.
            self.state = Some(PipelineState::NotStarted { source, store });
            return Err(strata_error!(
                ErrorKind::ConfigError,
                "Invalid pipeline configuration",
                err.to_string()
            ));
        }

        info!(
            pipeline_id = self.id,
            entity = %self.config.entity.name,
            raw_table = %self.config.entity.raw_table(),
            resolved_table = %self.config.entity.resolved_table(),
            "starting pipeline"
        );

        let landing = Landing::new(&self.config, source, store.clone())?;
        let worker = LandingWorker::new(
            landing,
            Duration::from_millis(self.config.poll_interval_ms),
            self.shutdown_tx.subscribe(),
        );

        self.state = Some(PipelineState::Started {
            landing_worker: worker.start(),
            store,
        });

        Ok(())
    }

    /// Runs one resolution pass for this entity.
    ///
    /// May run while landing continues; the resolved tables only ever see
    /// the whole effect of a pass or none of it. A `TransactionConflict`
    /// means another pass is in flight and this one was aborted; retry
    /// belongs to the invoking scheduler.
    pub async fn resolve(&self) -> StrataResult<ResolutionOutcome> {
        let store = match &self.state {
            Some(PipelineState::NotStarted { store, .. }) => store,
            Some(PipelineState::Started { store, .. }) => store,
            None => {
                bail!(
                    ErrorKind::ConfigError,
                    "Pipeline has already been waited on",
                    self.config.entity.name.clone()
                );
            }
        };

        resolve_entity(store, &self.config.entity).await
    }

    /// Requests shutdown of the landing worker.
    pub fn shutdown(&self) {
        info!(pipeline_id = self.id, "requesting pipeline shutdown");

        if let Err(err) = self.shutdown_tx.shutdown() {
            error!(
                pipeline_id = self.id,
                "no running workers to shut down: {err}"
            );
        }
    }

    /// Waits for the landing worker to stop and returns its totals.
    pub async fn wait(self) -> StrataResult<LandingStats> {
        let Some(PipelineState::Started { landing_worker, .. }) = self.state else {
            info!(
                pipeline_id = self.id,
                "pipeline was not started, nothing to wait for"
            );
            return Ok(LandingStats::default());
        };

        landing_worker.wait().await
    }

    /// Requests shutdown and waits for the landing worker to stop.
    pub async fn shutdown_and_wait(self) -> StrataResult<LandingStats> {
        self.shutdown();
        self.wait().await
    }
}
