//! Log output for the gateway.
//!
//! The subscriber is installed at startup, before the config file is read,
//! so the level from `[logging]` is swapped in afterwards through a reload
//! handle.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

const STARTUP_LEVEL: &str = "info";

/// Installs the global subscriber at `info`, or at `RUST_LOG` when it is set
/// and parses. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(STARTUP_LEVEL));

    let (filter, handle) = reload::Layer::new(filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// Apply the configured logging level once the config file is loaded.
/// An explicit RUST_LOG wins over the config file.
pub fn apply_logging_level(level: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| {
            *f = EnvFilter::new(level);
        });
    }
}
