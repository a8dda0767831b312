use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ServerError;

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|err| ServerError::Logging(err.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(UtcTime::rfc_3339()),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
    };
    result.map_err(|err| ServerError::Logging(err.to_string()))
}
