//! Reporting mode flag

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether captured frames are mirrored to the relay.
///
/// Flipped from interrupt context by the debounce latch and forced off by the
/// forwarding task on bus faults. A separate change flag lets the forwarding
/// task update the mode indicator once per change.
#[derive(Debug, Default)]
pub struct ReportingMode {
    enabled: AtomicBool,
    changed: AtomicBool,
}

impl ReportingMode {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            changed: AtomicBool::new(false),
        }
    }

    /// Flip the mode, returning the new state
    pub fn toggle(&self) -> bool {
        let previous = self.enabled.fetch_xor(true, Ordering::AcqRel);
        self.changed.store(true, Ordering::Release);
        !previous
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turn reporting off. Returns `true` if it was on.
    pub fn force_off(&self) -> bool {
        let was_enabled = self.enabled.swap(false, Ordering::AcqRel);
        if was_enabled {
            self.changed.store(true, Ordering::Release);
        }
        was_enabled
    }

    /// Current state if it changed since the last call
    pub fn take_change(&self) -> Option<bool> {
        if self.changed.swap(false, Ordering::AcqRel) {
            Some(self.is_enabled())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_reports_change_once() {
        let mode = ReportingMode::default();
        assert_eq!(mode.take_change(), None);

        assert!(mode.toggle());
        assert_eq!(mode.take_change(), Some(true));
        assert_eq!(mode.take_change(), None);

        assert!(!mode.toggle());
        assert_eq!(mode.take_change(), Some(false));
    }

    #[test]
    fn test_force_off() {
        let mode = ReportingMode::new(true);
        assert!(mode.force_off());
        assert!(!mode.is_enabled());
        assert_eq!(mode.take_change(), Some(false));

        // Already off: nothing to report
        assert!(!mode.force_off());
        assert_eq!(mode.take_change(), None);
    }
}
