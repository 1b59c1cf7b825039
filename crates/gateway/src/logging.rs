//! Logging setup

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::LogConfig;
use crate::error::GatewayError;

/// Install the global tracing subscriber
pub fn init_logging(config: &LogConfig) -> Result<(), GatewayError> {
    let level: Level = config
        .level
        .parse()
        .map_err(|_| GatewayError::LogLevel(config.level.clone()))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.map_err(|e| GatewayError::Logging(e.to_string()))
}
