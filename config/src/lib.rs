//! Layered configuration loading for strata services.
//!
//! Configuration is assembled from a `configuration/` directory (a required
//! `base` file plus an optional per-environment overlay) and `APP_`-prefixed
//! environment variable overrides. The shared types consumed by the core
//! crate live under [`shared`].

pub mod environment;
pub mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{LoadConfigError, load_config};
