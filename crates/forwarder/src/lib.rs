//! Forwarding Engine
//!
//! Drains the per-bus frame queues once per cycle, retransmits every frame on
//! the opposite bus and, while reporting is on, mirrors it as an SLCAN line
//! to the relay task.

mod engine;
mod error;
mod indicator;

pub use engine::{CycleReport, Forwarder, ForwarderConfig};
pub use error::{ForwardError, IndicatorError};
pub use indicator::{Indicator, Indicators, LogIndicators};
