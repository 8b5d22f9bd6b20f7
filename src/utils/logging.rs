//! Logging setup using the `tracing` crate.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::utils::error::{Error, Result};

/// Initialize the global tracing subscriber.
///
/// Honors `RUST_LOG` when set; otherwise defaults to `debug` in verbose mode
/// and `info` otherwise.
pub fn setup_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logger: {e}")))?;

    Ok(())
}
