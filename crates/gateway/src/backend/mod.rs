//! Bus backends
//!
//! A backend owns the two bus controllers: it provides the transmitter used
//! by the forwarding task and runs the threads that stand in for interrupt
//! context, feeding frames and events into the capture handlers.

mod simulated;
#[cfg(target_os = "linux")]
mod can_socket;
mod staged;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use can_protocol::{BusId, BusTransmitter, RxHardware, VirtualBus};
use capture::{BusCapture, CaptureHandler, CaptureStats, Diagnostics};
use frame_queue::Producer;
use tokio::sync::Notify;

use crate::config::{BusBackend, BusConfig};
use crate::error::GatewayError;

pub use simulated::{spawn_simulated_traffic, synthetic_frame};
#[cfg(target_os = "linux")]
pub use can_socket::{SocketCanPair, SocketCanTransmitter};
pub use staged::StagedRx;

/// Capture-side state handed to the backend threads
pub struct CaptureContext {
    /// Producer ends of the bus queues, indexed by [`BusId::index`]
    pub producers: [Producer; 2],
    pub diagnostics: Arc<Diagnostics>,
    pub stats: Arc<CaptureStats>,
    /// Wakes the forwarding task after each capture event
    pub waker: Arc<Notify>,
    pub shutdown: Arc<AtomicBool>,
}

/// An opened bus pair
pub enum Backend {
    #[cfg(target_os = "linux")]
    SocketCan(SocketCanPair),
    Virtual(VirtualBus),
}

impl Backend {
    pub fn open(config: &BusConfig) -> Result<Self, GatewayError> {
        match config.backend {
            #[cfg(target_os = "linux")]
            BusBackend::SocketCan => Ok(Backend::SocketCan(SocketCanPair::open(
                &config.can1,
                &config.can2,
                Duration::from_millis(config.read_timeout_ms),
            )?)),
            #[cfg(not(target_os = "linux"))]
            BusBackend::SocketCan => Err(GatewayError::Backend(
                "SocketCAN is only available on Linux".to_string(),
            )),
            BusBackend::Virtual => Ok(Backend::Virtual(VirtualBus::new())),
        }
    }

    pub fn transmitter(&self) -> Box<dyn BusTransmitter + Send> {
        match self {
            #[cfg(target_os = "linux")]
            Backend::SocketCan(pair) => Box::new(pair.transmitter()),
            Backend::Virtual(bus) => Box::new(bus.clone()),
        }
    }

    /// Start the capture threads
    pub fn start(
        &self,
        context: CaptureContext,
        config: &BusConfig,
    ) -> Result<Vec<JoinHandle<()>>, GatewayError> {
        let [can1, can2] = context.producers;
        let diagnostics = &context.diagnostics;
        let stats = &context.stats;

        match self {
            #[cfg(target_os = "linux")]
            Backend::SocketCan(pair) => Ok(vec![
                pair.spawn_reader(
                    bus_capture(BusId::Can1, StagedRx::new(), can1, diagnostics, stats),
                    context.waker.clone(),
                    context.shutdown.clone(),
                )?,
                pair.spawn_reader(
                    bus_capture(BusId::Can2, StagedRx::new(), can2, diagnostics, stats),
                    context.waker.clone(),
                    context.shutdown.clone(),
                )?,
            ]),
            Backend::Virtual(bus) => {
                let handler = CaptureHandler::new(
                    bus_capture(BusId::Can1, bus.rx(BusId::Can1), can1, diagnostics, stats),
                    bus_capture(BusId::Can2, bus.rx(BusId::Can2), can2, diagnostics, stats),
                );
                Ok(vec![spawn_simulated_traffic(
                    bus.clone(),
                    handler,
                    Duration::from_millis(config.virtual_period_ms),
                    context.waker.clone(),
                    context.shutdown.clone(),
                )?])
            }
        }
    }
}

fn bus_capture<H: RxHardware>(
    bus: BusId,
    hardware: H,
    queue: Producer,
    diagnostics: &Arc<Diagnostics>,
    stats: &Arc<CaptureStats>,
) -> BusCapture<H> {
    BusCapture::new(bus, hardware, queue, diagnostics.clone(), stats.clone())
}
