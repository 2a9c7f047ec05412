// Logging set-up for the binary: a fmt layer on stderr filtered by
// `RUST_LOG`, falling back to `warn` (or `debug` with `-v`).

use std::io::IsTerminal;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("Failed to initialize logger: {0}")]
    InitializationFailed(String),
}

/// Default filter: `warn`, or `debug` for this crate when verbose.
pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "warn,jabbercracky_client=debug"
    } else {
        "warn"
    }
}

/// Installs a stderr fmt subscriber. `RUST_LOG` takes precedence over the
/// default level.
pub fn init(verbose: bool) -> Result<(), LoggerError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => mk_filter(default_level(verbose))?,
    };
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(verbose);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggerError::InitializationFailed(e.to_string()))
}

fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}
