//! Lock-Free Frame Queue
//!
//! Fixed-capacity single-producer/single-consumer ring of CAN frames. The
//! producer side runs in interrupt context and never blocks; when the ring
//! is full the oldest unread frame is dropped in favour of the newest one.

mod queue;
mod slot;

pub use queue::{Consumer, FrameQueue, Producer, QueueMonitor, QueueStats, DEFAULT_CAPACITY};

use thiserror::Error;

/// Queue construction errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// A ring needs at least two slots to hold one frame
    #[error("Queue capacity {0} is too small (minimum 2)")]
    CapacityTooSmall(usize),
}
