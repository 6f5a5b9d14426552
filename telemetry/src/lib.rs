//! Telemetry initialization for strata services and tests.

pub mod tracing;
