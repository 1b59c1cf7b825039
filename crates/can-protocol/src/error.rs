//! CAN Error Types

use thiserror::Error;

use crate::frame::BusId;

/// Errors reported by bus primitives
#[derive(Debug, Error)]
pub enum CanError {
    /// No free transmit mailbox
    #[error("{0}: all transmit mailboxes busy")]
    MailboxFull(BusId),

    /// The controller is in bus-off state
    #[error("{0}: bus off")]
    BusOff(BusId),

    /// The controller rejected or failed the transmission
    #[error("{bus}: transmit failed: {reason}")]
    Transmit { bus: BusId, reason: String },

    /// A frame could not be represented by the backend
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Interface-level I/O error
    #[error("CAN I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CanError {
    fn from(err: std::io::Error) -> Self {
        CanError::Io(err.to_string())
    }
}
