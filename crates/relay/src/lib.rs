//! Relay Channel
//!
//! Carries encoded frame lines from the forwarding task to the relay task:
//! - [`TaskDirectory`] registers tasks by name and hands out endpoints
//! - [`RelaySender`] posts lines without ever blocking the producer
//! - [`RelayTask`] pulls lines in blocking or non-blocking mode and writes
//!   them to a [`RelaySink`]

mod channel;
mod directory;
mod error;
mod message;
mod sink;
mod task;

pub use channel::{RelayReceiver, RelaySender};
pub use directory::{Endpoint, TaskDirectory, TaskId};
pub use error::RelayError;
pub use message::{RelayMessage, TextBuffer, MAX_PAYLOAD};
pub use sink::{LogSink, RawSink, RelaySink};
pub use task::{PollOutcome, ReceiveMode, RelayConfig, RelayTask};

/// Directory name of the forwarding task
pub const FORWARDER_TASK: &str = "CANSPY";

/// Directory name of the relay task
pub const RELAY_TASK: &str = "CANSNIF";
