//! Global tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::{ConfigError, LogConfig, LogFormat};

/// Installs the global subscriber. `RUST_LOG` wins over `cfg.filter`.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(cfg: &LogConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.filter))
        .map_err(|e| ConfigError::Invalid(format!("log.filter: {e}")))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match cfg.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| ConfigError::Telemetry(e.to_string()))
}
