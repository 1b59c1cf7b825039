//! Interrupt counters

use std::sync::atomic::{AtomicU64, Ordering};

use can_protocol::{BusId, CanEventKind};

/// Per-bus, per-event-kind interrupt counters
#[derive(Debug, Default)]
pub struct CaptureStats {
    interrupts: AtomicU64,
    events: [[AtomicU64; CanEventKind::COUNT]; 2],
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, bus: BusId, kind: CanEventKind) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
        self.events[bus.index()][kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        let mut events = [[0u64; CanEventKind::COUNT]; 2];
        for (bus, counters) in self.events.iter().enumerate() {
            for (kind, counter) in counters.iter().enumerate() {
                events[bus][kind] = counter.load(Ordering::Relaxed);
            }
        }
        CaptureSnapshot {
            interrupts: self.interrupts.load(Ordering::Relaxed),
            events,
        }
    }
}

/// Copy of the counters at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub interrupts: u64,
    events: [[u64; CanEventKind::COUNT]; 2],
}

impl CaptureSnapshot {
    pub fn count(&self, bus: BusId, kind: CanEventKind) -> u64 {
        self.events[bus.index()][kind.index()]
    }

    /// All events seen on one bus
    pub fn bus_total(&self, bus: BusId) -> u64 {
        self.events[bus.index()].iter().sum()
    }
}
