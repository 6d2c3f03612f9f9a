//! Environment-variable configuration, `BRRTR_*`-style, for the values
//! [`crate::processor::ProcessorOptions`] exposes programmatically.
//!
//! These are not new knobs: `COMMANDBUS_DEFAULT_WORKERS` and
//! `COMMANDBUS_SHUTDOWN_TIMEOUT_MS` back the same `workers` and
//! `shutdown_timeout` options a caller can set directly on
//! [`crate::processor::ProcessorBuilder`]; this module only supplies the
//! defaults when they're left unset.

use std::env;
use std::time::Duration;

const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_WORKERS: usize = 1;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Default worker count for async processors (`COMMANDBUS_DEFAULT_WORKERS`).
    pub default_workers: usize,
    /// Default graceful-shutdown bound (`COMMANDBUS_SHUTDOWN_TIMEOUT_MS`).
    pub shutdown_timeout: Duration,
}

impl RuntimeConfig {
    /// Load configuration from environment variables, falling back to
    /// `spec.md`'s documented defaults (1 worker, 30s shutdown) for any
    /// variable that is unset or unparsable.
    pub fn from_env() -> Self {
        let default_workers = env::var("COMMANDBUS_DEFAULT_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_WORKERS);

        let shutdown_timeout_ms = env::var("COMMANDBUS_SHUTDOWN_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS);

        RuntimeConfig {
            default_workers,
            shutdown_timeout: Duration::from_millis(shutdown_timeout_ms),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            default_workers: DEFAULT_WORKERS,
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        }
    }
}
