//! CANSPY Gateway
//!
//! Host runtime for the two-bus CAN forwarder: configuration, logging, bus
//! backends and the wiring between capture, forwarding and relay.

pub mod backend;
#[cfg(unix)]
mod button;
mod config;
mod error;
mod logging;
mod pipeline;

#[cfg(unix)]
pub use button::watch_button;
pub use config::{BusBackend, BusConfig, GatewayConfig, LogConfig, QueueConfig, SerialConfig};
pub use error::GatewayError;
pub use logging::init_logging;
pub use pipeline::Gateway;
