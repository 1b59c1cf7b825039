//! Interrupt-Context Capture
//!
//! Everything in this crate may run at interrupt priority: no blocking, no
//! allocation, no I/O. State shared with the forwarding task lives in atomics:
//! - [`BusCapture`] moves frames from hardware FIFOs into the bus queue
//! - [`Diagnostics`] holds sticky abort/error flags per bus
//! - [`DebounceLatch`] turns button edges into [`ReportingMode`] toggles
//! - [`CaptureStats`] counts interrupts per bus and event kind

mod debounce;
mod diagnostics;
mod handler;
mod mode;
mod stats;

pub use debounce::{DebounceConfig, DebounceLatch, ManualClock, MonotonicClock, SystemClock};
pub use diagnostics::{BusDiagnostics, BusFault, Diagnostics, FaultKind};
pub use handler::{BusCapture, CaptureHandler};
pub use mode::ReportingMode;
pub use stats::{CaptureSnapshot, CaptureStats};
