//! Gateway Error Types

use can_protocol::CanError;
use forwarder::ForwardError;
use frame_queue::QueueError;
use relay::RelayError;
use thiserror::Error;

/// Errors raised while bringing up or running the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid log level: {0}")]
    LogLevel(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Bus backend unavailable: {0}")]
    Backend(String),

    #[error(transparent)]
    Can(#[from] CanError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
