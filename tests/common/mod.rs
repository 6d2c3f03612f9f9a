//! Shared test-harness setup: one-time `tracing` initialization so the
//! bus's `tracing::info!`/`warn!`/`error!` output (via `TracingLogger` and
//! `LoggingMiddleware`) is visible when a test is run with `-- --nocapture`
//! instead of silently going nowhere.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a `tracing-subscriber` `fmt` subscriber once per test binary.
/// Safe to call from every test; later calls are no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
