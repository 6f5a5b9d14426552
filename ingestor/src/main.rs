//! CDC ingestor service binary.
//!
//! Runs one landing pipeline per configured entity and resolves each
//! entity's raw log into its silver table on a fixed interval, until the
//! process receives SIGINT or SIGTERM.

use telemetry::tracing::init_tracing;

use crate::config::load_ingestor_config;
use crate::core::start_ingestor_with_config;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let ingestor_config = load_ingestor_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_ingestor_with_config(ingestor_config))
}
