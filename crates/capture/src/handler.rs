//! CAN interrupt handler

use std::sync::Arc;

use can_protocol::{BusId, CanEvent, RxFifo, RxHardware, HW_FIFO_DEPTH};
use frame_queue::Producer;
use tracing::trace;

use crate::diagnostics::Diagnostics;
use crate::stats::CaptureStats;

/// Capture state for a single bus: its receive hardware and the producer end
/// of its frame queue.
pub struct BusCapture<H: RxHardware> {
    bus: BusId,
    hardware: H,
    queue: Producer,
    diagnostics: Arc<Diagnostics>,
    stats: Arc<CaptureStats>,
}

impl<H: RxHardware> BusCapture<H> {
    pub fn new(
        bus: BusId,
        hardware: H,
        queue: Producer,
        diagnostics: Arc<Diagnostics>,
        stats: Arc<CaptureStats>,
    ) -> Self {
        Self {
            bus,
            hardware,
            queue,
            diagnostics,
            stats,
        }
    }

    pub fn bus(&self) -> BusId {
        self.bus
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Handle one controller event. Bounded work: at most
    /// [`HW_FIFO_DEPTH`] frames are moved per call.
    pub fn on_event(&mut self, event: CanEvent) {
        self.stats.record(self.bus, event.kind());

        match event {
            CanEvent::MessagePending(fifo) => {
                self.buffer_frame(fifo);
            }
            CanEvent::FifoFull(fifo) => {
                for _ in 0..HW_FIFO_DEPTH {
                    if !self.buffer_frame(fifo) {
                        break;
                    }
                }
            }
            CanEvent::TransmitAbort(_, code) => {
                self.diagnostics.bus(self.bus).record_abort(code);
            }
            CanEvent::Error(code) => {
                self.diagnostics.bus(self.bus).record_error(code);
            }
        }
    }

    /// Move one frame from hardware to the queue. `false` if the FIFO was empty.
    fn buffer_frame(&mut self, fifo: RxFifo) -> bool {
        match self.hardware.receive(fifo) {
            Some(frame) => {
                if self.queue.push(frame) {
                    trace!(bus = %self.bus, "queue full, oldest frame dropped");
                }
                true
            }
            None => false,
        }
    }
}

/// Dispatches controller events of both buses to their [`BusCapture`]
pub struct CaptureHandler<H: RxHardware> {
    can1: BusCapture<H>,
    can2: BusCapture<H>,
}

impl<H: RxHardware> CaptureHandler<H> {
    pub fn new(can1: BusCapture<H>, can2: BusCapture<H>) -> Self {
        debug_assert_eq!(can1.bus(), BusId::Can1);
        debug_assert_eq!(can2.bus(), BusId::Can2);
        Self { can1, can2 }
    }

    pub fn on_event(&mut self, bus: BusId, event: CanEvent) {
        match bus {
            BusId::Can1 => self.can1.on_event(event),
            BusId::Can2 => self.can2.on_event(event),
        }
    }
}
