//! Sticky per-bus fault flags

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use can_protocol::{BusErrorCode, BusId};

/// Kind of fault raised by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    TransmitAbort,
    BusError,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::TransmitAbort => f.write_str("emit aborted"),
            FaultKind::BusError => f.write_str("error"),
        }
    }
}

/// A fault observed by the forwarding task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault {
    pub bus: BusId,
    pub kind: FaultKind,
    pub code: BusErrorCode,
}

/// Abort/error flags for one bus.
///
/// The error code slot is shared by both flags and overwritten by every new
/// event, so a reader sees the code of the most recent fault only.
#[derive(Debug, Default)]
pub struct BusDiagnostics {
    aborted: AtomicBool,
    errored: AtomicBool,
    code: AtomicU32,
}

impl BusDiagnostics {
    pub fn record_abort(&self, code: BusErrorCode) {
        self.code.store(code.0, Ordering::Relaxed);
        self.aborted.store(true, Ordering::Release);
    }

    pub fn record_error(&self, code: BusErrorCode) {
        self.code.store(code.0, Ordering::Relaxed);
        self.errored.store(true, Ordering::Release);
    }

    /// Clear and return one pending fault. An abort wins over an error; a
    /// pending error then stays set until the next call.
    pub fn take(&self) -> Option<(FaultKind, BusErrorCode)> {
        let kind = if self.aborted.swap(false, Ordering::AcqRel) {
            FaultKind::TransmitAbort
        } else if self.errored.swap(false, Ordering::AcqRel) {
            FaultKind::BusError
        } else {
            return None;
        };
        Some((kind, BusErrorCode(self.code.load(Ordering::Relaxed))))
    }
}

/// Fault flags for both buses
#[derive(Debug, Default)]
pub struct Diagnostics {
    buses: [BusDiagnostics; 2],
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(&self, bus: BusId) -> &BusDiagnostics {
        &self.buses[bus.index()]
    }

    /// Take at most one fault for `bus`
    pub fn take_fault(&self, bus: BusId) -> Option<BusFault> {
        self.bus(bus)
            .take()
            .map(|(kind, code)| BusFault { bus, kind, code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_checked_before_error() {
        let diag = Diagnostics::new();
        diag.bus(BusId::Can1).record_error(BusErrorCode(1));
        diag.bus(BusId::Can1).record_abort(BusErrorCode(2));

        let fault = diag.take_fault(BusId::Can1).unwrap();
        assert_eq!(fault.kind, FaultKind::TransmitAbort);
        assert_eq!(fault.code, BusErrorCode(2));

        // The error is still pending, reported on the next poll
        let fault = diag.take_fault(BusId::Can1).unwrap();
        assert_eq!(fault.kind, FaultKind::BusError);
        assert_eq!(diag.take_fault(BusId::Can1), None);
    }

    #[test]
    fn test_last_code_wins() {
        let diag = Diagnostics::new();
        diag.bus(BusId::Can2).record_error(BusErrorCode(10));
        diag.bus(BusId::Can2).record_error(BusErrorCode(11));
        assert_eq!(
            diag.take_fault(BusId::Can2),
            Some(BusFault {
                bus: BusId::Can2,
                kind: FaultKind::BusError,
                code: BusErrorCode(11),
            })
        );
    }

    #[test]
    fn test_buses_are_independent() {
        let diag = Diagnostics::new();
        diag.bus(BusId::Can2).record_abort(BusErrorCode(3));
        assert_eq!(diag.take_fault(BusId::Can1), None);
        assert_eq!(
            diag.take_fault(BusId::Can2).map(|fault| fault.kind),
            Some(FaultKind::TransmitAbort)
        );
    }
}
