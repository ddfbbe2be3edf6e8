use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter directive applied when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVES: &str = "info";

// The global subscriber can be installed only once per process, while integration
// tests call `init_test_tracing` from every test function.
static TEST_TRACING: Once = Once::new();

/// Initializes the global tracing subscriber for a connector process.
///
/// Filtering follows `RUST_LOG` when set and falls back to `info`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into()))
        .with(fmt::layer())
        .init();

    tracing::info!("tracing initialized");
}

/// Initializes tracing for tests.
///
/// Safe to call from every test function; output is routed through the test writer
/// so it interleaves correctly with the harness capture.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into()))
            .with(fmt::layer().with_test_writer())
            .init();
    });
}
