//! Tracing setup.
//!
//! Structured logging only — no distributed tracing backend; the engine
//! runs as a single process with no downstream spans worth exporting.
//!
//! `RUST_LOG` overrides [`LoggingConfig::level`] when set, following
//! `tracing_subscriber`'s usual convention.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber.
///
/// # Panics
///
/// Panics if a subscriber has already been installed.
pub fn init_telemetry(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);

    if config.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}
