//! Bus Hardware Primitives

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::error::CanError;
use crate::frame::{BusId, CanFrame, RxFifo};
use crate::HW_FIFO_DEPTH;

/// Receive side of one bus controller, read from interrupt context.
///
/// Implementations must not block: an empty FIFO yields `None`.
pub trait RxHardware {
    fn receive(&mut self, fifo: RxFifo) -> Option<CanFrame>;
}

/// Transmit side of the bus pair, used by the forwarding task
pub trait BusTransmitter {
    fn transmit(&mut self, bus: BusId, frame: &CanFrame) -> Result<(), CanError>;
}

impl<T: BusTransmitter + ?Sized> BusTransmitter for Box<T> {
    fn transmit(&mut self, bus: BusId, frame: &CanFrame) -> Result<(), CanError> {
        (**self).transmit(bus, frame)
    }
}

#[derive(Debug, Default)]
struct VirtualState {
    fifos: [[VecDeque<CanFrame>; 2]; 2],
    transmitted: [Vec<CanFrame>; 2],
    failing: [bool; 2],
}

/// In-memory bus pair with two hardware FIFOs per bus.
///
/// Clones share state, so a test can keep one handle to inject frames and
/// inspect transmissions while the pipeline owns others.
#[derive(Debug, Clone, Default)]
pub struct VirtualBus {
    inner: Arc<Mutex<VirtualState>>,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, VirtualState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Place a frame in a hardware FIFO. Returns `false` if the FIFO already
    /// holds [`HW_FIFO_DEPTH`] frames (the frame is lost, as on real hardware).
    pub fn inject(&self, bus: BusId, fifo: RxFifo, frame: CanFrame) -> bool {
        let mut state = self.state();
        let queue = &mut state.fifos[bus.index()][fifo.index()];
        if queue.len() >= HW_FIFO_DEPTH {
            trace!("{} {:?} overrun, frame lost", bus, fifo);
            return false;
        }
        queue.push_back(frame);
        true
    }

    /// Frames still sitting in a hardware FIFO
    pub fn pending(&self, bus: BusId, fifo: RxFifo) -> usize {
        self.state().fifos[bus.index()][fifo.index()].len()
    }

    /// Receive handle for one bus
    pub fn rx(&self, bus: BusId) -> VirtualRx {
        VirtualRx {
            bus,
            inner: self.inner.clone(),
        }
    }

    /// Frames transmitted on `bus`, oldest first
    pub fn transmitted(&self, bus: BusId) -> Vec<CanFrame> {
        self.state().transmitted[bus.index()].clone()
    }

    /// Drain the transmit log of `bus`
    pub fn take_transmitted(&self, bus: BusId) -> Vec<CanFrame> {
        std::mem::take(&mut self.state().transmitted[bus.index()])
    }

    /// Make every transmission on `bus` fail until reset
    pub fn set_transmit_failure(&self, bus: BusId, failing: bool) {
        self.state().failing[bus.index()] = failing;
    }
}

impl BusTransmitter for VirtualBus {
    fn transmit(&mut self, bus: BusId, frame: &CanFrame) -> Result<(), CanError> {
        let mut state = self.state();
        if state.failing[bus.index()] {
            return Err(CanError::MailboxFull(bus));
        }
        state.transmitted[bus.index()].push(*frame);
        Ok(())
    }
}

/// Receive side of a [`VirtualBus`] for a single bus
#[derive(Debug, Clone)]
pub struct VirtualRx {
    bus: BusId,
    inner: Arc<Mutex<VirtualState>>,
}

impl RxHardware for VirtualRx {
    fn receive(&mut self, fifo: RxFifo) -> Option<CanFrame> {
        let mut state = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.fifos[self.bus.index()][fifo.index()].pop_front()
    }
}
