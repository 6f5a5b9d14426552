use std::sync::Once;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Default directive applied when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVE: &str = "info";

static TEST_TRACING: Once = Once::new();

/// Initializes tracing for a service binary.
///
/// Emits human-readable logs on stdout through a non-blocking writer and
/// bridges `log` records into tracing. The returned guard must be held for
/// the lifetime of the process, dropping it flushes and stops the writer.
///
/// Respects `RUST_LOG` for filtering and defaults to `info`.
pub fn init_tracing(service_name: &str) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    LogTracer::init()?;

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let subscriber = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
        )
        .with_writer(writer)
        .with_target(false)
        .finish();

    ::tracing::subscriber::set_global_default(subscriber)?;
    ::tracing::info!(service = service_name, "tracing initialized");

    Ok(guard)
}

/// Initializes tracing for tests.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// Output is routed through the test writer so it is captured per test.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
            )
            .with_test_writer()
            .try_init();
    });
}
