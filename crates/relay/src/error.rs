//! Relay Error Types

use thiserror::Error;

use crate::directory::TaskId;

/// Errors on the relay path
#[derive(Debug, Error)]
pub enum RelayError {
    /// Payload does not fit in one message
    #[error("Payload of {0} bytes exceeds the 128-byte message limit")]
    PayloadTooLarge(usize),

    /// A message claims more payload than a message can carry
    #[error("Invalid message: claimed length {0} exceeds 128 bytes")]
    InvalidLength(usize),

    /// Message from a task this endpoint does not listen to
    #[error("Message from {from} denied (listening to {expected})")]
    Denied { from: TaskId, expected: TaskId },

    /// The receiving inbox is full
    #[error("Relay inbox busy")]
    Busy,

    /// The other side of the channel is gone
    #[error("Relay peer disconnected")]
    Disconnected,

    /// No task registered under this name
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// A task with this name is already registered
    #[error("Task already registered: {0}")]
    DuplicateTask(String),

    /// Output sink failure
    #[error("Sink error: {0}")]
    Sink(String),
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Sink(err.to_string())
    }
}

impl From<tokio_serial::Error> for RelayError {
    fn from(err: tokio_serial::Error) -> Self {
        RelayError::Sink(err.to_string())
    }
}
