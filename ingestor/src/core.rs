use std::time::Duration;

use config::shared::{EntityConfig, IngestorConfig, PipelineConfig, SourceConfig};
use strata::error::ErrorKind;
use strata::pipeline::{Pipeline, PipelineId};
use strata::resolve::resolve_entity;
use strata::source::NdjsonDirSource;
use strata::store::MemoryStore;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

/// Starts the ingestor service with the provided configuration.
///
/// Builds one pipeline per entity over a shared store, runs their landing
/// workers, and triggers resolution for every entity on the configured
/// interval. Returns once a termination signal has been received and every
/// landing worker has stopped at a batch boundary.
pub async fn start_ingestor_with_config(ingestor_config: IngestorConfig) -> anyhow::Result<()> {
    info!(
        entities = ingestor_config.entities.len(),
        landing_root = %ingestor_config.source.landing_root,
        "starting ingestor service"
    );

    let store = MemoryStore::new();

    let mut pipelines = Vec::with_capacity(ingestor_config.entities.len());
    for (index, entity) in ingestor_config.entities.iter().enumerate() {
        let pipeline_id = index as PipelineId + 1;
        let mut pipeline = build_pipeline(
            pipeline_id,
            entity.clone(),
            &ingestor_config.source,
            store.clone(),
        );
        pipeline.start().await?;
        pipelines.push(pipeline);
    }

    let resolve_interval = Duration::from_millis(ingestor_config.resolve_interval_ms);
    let mut resolve_ticker = tokio::time::interval(resolve_interval);
    // The first tick fires immediately; skip it so resolution starts one
    // interval after boot, when landing has had a chance to run.
    resolve_ticker.tick().await;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = resolve_ticker.tick() => {
                resolve_all(&pipelines).await;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
        }
    }

    for pipeline in pipelines.iter() {
        pipeline.shutdown();
    }

    let mut failures = Vec::new();
    for pipeline in pipelines {
        let id = pipeline.id();
        match pipeline.wait().await {
            Ok(stats) => {
                info!(
                    pipeline_id = id,
                    batches = stats.batches_landed,
                    events = stats.events_landed,
                    "landing worker drained"
                );
            }
            Err(err) => {
                error!(pipeline_id = id, "landing worker failed: {err}");
                failures.push(err);
            }
        }
    }

    // One final resolution pass so that everything landed before shutdown
    // is reflected in the silver tables.
    for entity in &ingestor_config.entities {
        if let Err(err) = resolve_entity(&store, entity).await {
            error!(entity = %entity.name, "final resolution failed: {err}");
        }
    }

    if let Some(err) = failures.into_iter().next() {
        return Err(err.into());
    }

    Ok(())
}

/// Builds the pipeline for one entity.
fn build_pipeline(
    pipeline_id: PipelineId,
    entity: EntityConfig,
    source_config: &SourceConfig,
    store: MemoryStore,
) -> Pipeline<NdjsonDirSource, MemoryStore> {
    let source = NdjsonDirSource::new(
        &source_config.landing_root,
        &entity.source_topic,
        &source_config.checkpoint_dir,
    );

    let pipeline_config = PipelineConfig {
        id: pipeline_id,
        entity,
        poll_interval_ms: source_config.poll_interval_ms,
    };

    Pipeline::new(pipeline_id, pipeline_config, source, store)
}

/// Runs one resolution pass for every pipeline.
///
/// A `TransactionConflict` only means a pass for that entity is still in
/// flight; the next tick retries it, so it is logged and skipped rather
/// than treated as a failure.
async fn resolve_all(pipelines: &[Pipeline<NdjsonDirSource, MemoryStore>]) {
    for pipeline in pipelines {
        match pipeline.resolve().await {
            Ok(outcome) => {
                info!(
                    pipeline_id = pipeline.id(),
                    rows_affected = outcome.rows_affected(),
                    "resolution pass complete"
                );
            }
            Err(err) if err.kind() == ErrorKind::TransactionConflict => {
                warn!(
                    pipeline_id = pipeline.id(),
                    "resolution already in flight, will retry next tick"
                );
            }
            Err(err) => {
                error!(pipeline_id = pipeline.id(), "resolution failed: {err}");
            }
        }
    }
}
