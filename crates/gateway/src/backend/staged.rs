//! Software receive FIFO

use std::collections::VecDeque;

use can_protocol::{CanFrame, RxFifo, RxHardware, HW_FIFO_DEPTH};

/// Receive FIFO filled by a reader thread just before it raises the
/// capture event, emptied by the capture handler.
#[derive(Debug, Default)]
pub struct StagedRx {
    fifo: VecDeque<CanFrame>,
}

impl StagedRx {
    pub fn new() -> Self {
        Self {
            fifo: VecDeque::with_capacity(HW_FIFO_DEPTH),
        }
    }

    /// Returns `false` (and drops the frame) when already holding
    /// [`HW_FIFO_DEPTH`] frames
    pub fn stage(&mut self, frame: CanFrame) -> bool {
        if self.fifo.len() >= HW_FIFO_DEPTH {
            return false;
        }
        self.fifo.push_back(frame);
        true
    }

    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }
}

impl RxHardware for StagedRx {
    fn receive(&mut self, _fifo: RxFifo) -> Option<CanFrame> {
        self.fifo.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_bounded_by_fifo_depth() {
        let mut rx = StagedRx::new();
        let frame = CanFrame::standard(0x10, &[1]).unwrap();
        for _ in 0..HW_FIFO_DEPTH {
            assert!(rx.stage(frame));
        }
        assert!(!rx.stage(frame));
        assert_eq!(rx.len(), HW_FIFO_DEPTH);

        assert_eq!(rx.receive(RxFifo::Fifo0), Some(frame));
        assert_eq!(rx.len(), HW_FIFO_DEPTH - 1);
    }
}
