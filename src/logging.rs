//! Logging initialization.
//!
//! The engine logs through `tracing`; embedding applications either install
//! their own subscriber or call [`init_logging`] once at startup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{LifecycleError, Result};

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LifecycleError::internal(format!("Invalid log level {:?}: {e}", config.level)))?,
    };

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };

    installed.map_err(|e| LifecycleError::internal(format!("Failed to install logger: {e}")))
}

/// Installs a global subscriber unless one is already installed.
///
/// Returns true if this call installed it.
#[must_use]
pub fn try_init_logging(config: &LoggingConfig) -> bool {
    init_logging(config).is_ok()
}
