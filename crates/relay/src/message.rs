//! Relay message and text buffer

use std::borrow::Cow;
use std::fmt;

use crate::directory::TaskId;
use crate::error::RelayError;

/// Maximum payload carried by one message
pub const MAX_PAYLOAD: usize = 128;

/// Fixed-size message: sender id plus up to [`MAX_PAYLOAD`] bytes
#[derive(Clone, PartialEq, Eq)]
pub struct RelayMessage {
    sender: TaskId,
    len: usize,
    payload: [u8; MAX_PAYLOAD],
}

impl RelayMessage {
    pub fn new(sender: TaskId, bytes: &[u8]) -> Result<Self, RelayError> {
        if bytes.len() > MAX_PAYLOAD {
            return Err(RelayError::PayloadTooLarge(bytes.len()));
        }
        let mut payload = [0u8; MAX_PAYLOAD];
        payload[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            sender,
            len: bytes.len(),
            payload,
        })
    }

    /// Build from a raw receive buffer and the length the transport claims
    pub(crate) fn from_raw(
        sender: TaskId,
        payload: [u8; MAX_PAYLOAD],
        claimed_len: usize,
    ) -> Result<Self, RelayError> {
        if claimed_len > MAX_PAYLOAD {
            return Err(RelayError::InvalidLength(claimed_len));
        }
        Ok(Self {
            sender,
            len: claimed_len,
            payload,
        })
    }

    pub fn sender(&self) -> TaskId {
        self.sender
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len]
    }
}

/// A message as it sits in an inbox. The receiver validates the claimed
/// length before handing out a [`RelayMessage`].
pub(crate) struct Envelope {
    pub(crate) sender: TaskId,
    pub(crate) len: usize,
    pub(crate) payload: [u8; MAX_PAYLOAD],
}

impl From<RelayMessage> for Envelope {
    fn from(message: RelayMessage) -> Self {
        Self {
            sender: message.sender,
            len: message.len,
            payload: message.payload,
        }
    }
}

impl fmt::Debug for RelayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayMessage")
            .field("sender", &self.sender)
            .field("len", &self.len)
            .field("payload", &String::from_utf8_lossy(self.payload()))
            .finish()
    }
}

/// Payload copy with room for a terminating NUL
pub struct TextBuffer {
    buf: [u8; MAX_PAYLOAD + 1],
    len: usize,
}

impl TextBuffer {
    pub fn from_message(message: &RelayMessage) -> Self {
        let payload = message.payload();
        let mut buf = [0u8; MAX_PAYLOAD + 1];
        buf[..payload.len()].copy_from_slice(payload);
        buf[payload.len()] = 0;
        Self {
            buf,
            len: payload.len(),
        }
    }

    /// Text bytes, without the terminator
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}
