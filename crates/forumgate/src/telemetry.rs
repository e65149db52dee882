//! Tracing initialisation.
//!
//! Installs a `tracing-subscriber` registry writing to stderr. `RUST_LOG`
//! takes precedence over the configured level.
//!
//! ```rust,no_run
//! use forumgate::{LoggingConfig, telemetry};
//!
//! telemetry::init_tracing(&LoggingConfig::default())?;
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// The filter [`init_tracing`] installs.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> io::Result<()> {
    let subscriber = tracing_subscriber::registry().with(env_filter(config));

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}
