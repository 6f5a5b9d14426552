use anyhow::Context;
use config::shared::IngestorConfig;

/// Loads and validates the ingestor configuration.
///
/// Configuration comes from the `configuration/` directory plus `APP_`
/// environment variable overrides; see [`config::load_config`].
pub fn load_ingestor_config() -> anyhow::Result<IngestorConfig> {
    let ingestor_config: IngestorConfig =
        config::load_config().context("failed to load ingestor configuration")?;

    ingestor_config
        .validate()
        .context("invalid ingestor configuration")?;

    Ok(ingestor_config)
}
