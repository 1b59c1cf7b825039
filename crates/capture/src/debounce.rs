//! Debounced button input

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::mode::ReportingMode;

/// Sentinel for "no edge accepted yet"
const NO_EVENT: u64 = u64::MAX;

/// Millisecond clock that never goes backwards
pub trait MonotonicClock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Milliseconds elapsed since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl MonotonicClock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Debounce configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Minimum spacing between accepted edges (milliseconds)
    pub threshold_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { threshold_ms: 20 }
    }
}

/// Turns raw button edges into reporting-mode toggles.
///
/// An edge is accepted when at least `threshold_ms` elapsed since the last
/// accepted edge; the first edge is always accepted. Rejected edges do not
/// move the reference point.
pub struct DebounceLatch<C: MonotonicClock> {
    clock: C,
    threshold_ms: u64,
    last_accepted: AtomicU64,
    bounces: AtomicU64,
    mode: Arc<ReportingMode>,
}

impl<C: MonotonicClock> DebounceLatch<C> {
    pub fn new(config: DebounceConfig, clock: C, mode: Arc<ReportingMode>) -> Self {
        Self {
            clock,
            threshold_ms: config.threshold_ms,
            last_accepted: AtomicU64::new(NO_EVENT),
            bounces: AtomicU64::new(0),
            mode,
        }
    }

    /// Raw edge entry point, safe to call from interrupt context.
    /// Returns `true` if the edge toggled the reporting mode.
    pub fn on_edge(&self) -> bool {
        let now = self.clock.now_ms();
        let last = self.last_accepted.load(Ordering::Acquire);

        if last != NO_EVENT && now.saturating_sub(last) < self.threshold_ms {
            self.bounces.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if self
            .last_accepted
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // A concurrent edge won; this one is its bounce
            self.bounces.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let enabled = self.mode.toggle();
        trace!(now, enabled, "button edge accepted");
        true
    }

    /// Edges discarded as bounce so far
    pub fn bounces(&self) -> u64 {
        self.bounces.load(Ordering::Relaxed)
    }
}
