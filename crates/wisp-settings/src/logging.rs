//! Logging bootstrap.

use tracing_subscriber::EnvFilter;

use crate::types::LoggingSettings;

/// Install the global tracing subscriber from logging settings.
///
/// `RUST_LOG` takes priority over the configured level. Calling this more
/// than once is harmless; later calls are no-ops.
pub fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    // Err means a subscriber is already installed, typically in tests.
    let _ = result;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
