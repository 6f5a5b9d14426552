use std::io;
use std::path::{Path, PathBuf};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use rust_cli_config::{Config, File};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for configuration files, probed in order.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator for nested configuration keys in environment variables.
///
/// `APP_SOURCE__LANDING_ROOT=/data/landing` overrides `source.landing_root`.
const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// The `configuration` directory does not exist.
    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// The required base configuration file could not be located.
    #[error("no base configuration file found in `{directory}`; attempted extensions: {attempted}")]
    BaseFileMissing { directory: PathBuf, attempted: String },

    /// Failed to determine the runtime environment (`APP_ENVIRONMENT`).
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] io::Error),

    /// A configuration file existed but could not be parsed or merged.
    #[error("failed to load configuration: {0}")]
    Merge(#[source] rust_cli_config::ConfigError),

    /// The configuration files were parsed but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),
}

/// Loads a configuration value of type `T` from layered sources.
///
/// Sources are merged in priority order, later ones overriding earlier ones:
/// 1. `configuration/base.{yaml,yml,json}` (required);
/// 2. `configuration/<environment>.{yaml,yml,json}` (optional overlay);
/// 3. `APP_`-prefixed environment variables, with `__` separating nested keys.
pub fn load_config<T: DeserializeOwned>() -> Result<T, LoadConfigError> {
    let base_dir = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let configuration_dir = base_dir.join(CONFIGURATION_DIR);
    if !configuration_dir.exists() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            configuration_dir,
        ));
    }

    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    let mut builder: ConfigBuilder<DefaultState> = Config::builder();

    let base_file = find_config_file(&configuration_dir, "base").ok_or_else(|| {
        LoadConfigError::BaseFileMissing {
            directory: configuration_dir.clone(),
            attempted: CONFIG_FILE_EXTENSIONS.join(", "),
        }
    })?;
    builder = builder.add_source(File::from(base_file));

    // The per-environment overlay is optional so that a dev checkout can run
    // from the base file alone.
    if let Some(overlay) = find_config_file(&configuration_dir, environment.as_str()) {
        builder = builder.add_source(File::from(overlay));
    }

    builder = builder.add_source(
        rust_cli_config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR),
    );

    let settings = builder.build().map_err(LoadConfigError::Merge)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Probes the configuration directory for `<stem>.<ext>` with each supported extension.
fn find_config_file(directory: &Path, stem: &str) -> Option<PathBuf> {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .find(|candidate| candidate.exists())
}
