//! Forwarding engine

use std::sync::Arc;
use std::time::Duration;

use can_protocol::{BusId, BusTransmitter, CanFrame, SlcanLine};
use capture::{BusFault, Diagnostics, ReportingMode};
use frame_queue::Consumer;
use relay::{RelayError, RelaySender};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::ForwardError;
use crate::indicator::{Indicator, Indicators};

/// Configuration for the forwarding task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Periodic wake-up (milliseconds)
    pub poll_period_ms: u64,
    /// Log a dump of every mirrored frame at debug level
    pub dump_frames: bool,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: 100,
            dump_frames: true,
        }
    }
}

impl ForwarderConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// New reporting state, if it changed since the previous cycle
    pub mode_changed: Option<bool>,
    /// Faults reported this cycle, per bus
    pub faults: [Option<BusFault>; 2],
    /// Frames drained from each bus's queue
    pub drained: [usize; 2],
    /// Frames retransmitted on the opposite bus
    pub forwarded: usize,
    pub transmit_failures: usize,
    /// Lines accepted by the relay channel
    pub relayed: usize,
    /// Lines the relay channel had no room for
    pub relay_dropped: usize,
}

/// The forwarding task: queues in, opposite bus and relay out
pub struct Forwarder<T: BusTransmitter, I: Indicators> {
    config: ForwarderConfig,
    queues: [Consumer; 2],
    transmitter: T,
    indicators: I,
    mode: Arc<ReportingMode>,
    diagnostics: Arc<Diagnostics>,
    relay: RelaySender,
    wake: Arc<Notify>,
    overflows_seen: [u64; 2],
}

impl<T: BusTransmitter, I: Indicators> Forwarder<T, I> {
    /// `queues` is indexed by [`BusId::index`]
    pub fn new(
        config: ForwarderConfig,
        queues: [Consumer; 2],
        transmitter: T,
        indicators: I,
        mode: Arc<ReportingMode>,
        diagnostics: Arc<Diagnostics>,
        relay: RelaySender,
    ) -> Self {
        Self {
            config,
            queues,
            transmitter,
            indicators,
            mode,
            diagnostics,
            relay,
            wake: Arc::new(Notify::new()),
            overflows_seen: [0; 2],
        }
    }

    /// Handle for waking the task before its next periodic wake-up
    pub fn waker(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub fn indicators(&self) -> &I {
        &self.indicators
    }

    /// Run one forwarding cycle
    pub fn run_cycle(&mut self) -> Result<CycleReport, ForwardError> {
        let mut report = CycleReport::default();

        if let Some(enabled) = self.mode.take_change() {
            self.indicators.set(Indicator::Mode, enabled)?;
            info!(enabled, "reporting mode changed");
            report.mode_changed = Some(enabled);
        }

        for bus in BusId::ALL {
            report.faults[bus.index()] = self.check_fault(bus)?;
        }

        for bus in BusId::ALL {
            self.drain(bus, &mut report)?;
        }

        self.indicators.set(Indicator::Traffic, false)?;
        Ok(report)
    }

    /// Run cycles until an indicator fails
    pub async fn run(mut self) -> Result<(), ForwardError> {
        info!(
            period_ms = self.config.poll_period_ms,
            "forwarding task started"
        );
        self.mode.take_change();
        self.indicators.set(Indicator::Mode, self.mode.is_enabled())?;
        self.indicators.set(Indicator::Traffic, false)?;

        let period = self.config.poll_period();
        loop {
            self.run_cycle()?;
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = self.wake.notified() => {}
            }
        }
    }

    fn check_fault(&mut self, bus: BusId) -> Result<Option<BusFault>, ForwardError> {
        let Some(fault) = self.diagnostics.take_fault(bus) else {
            return Ok(None);
        };

        if self.mode.force_off() {
            self.mode.take_change();
            self.indicators.set(Indicator::Mode, false)?;
        }
        warn!(bus = %fault.bus, code = %fault.code, "{} {}", fault.bus, fault.kind);
        metrics::counter!("canspy_bus_faults_total", "bus" => bus.as_str()).increment(1);
        Ok(Some(fault))
    }

    fn drain(&mut self, bus: BusId, report: &mut CycleReport) -> Result<(), ForwardError> {
        let idx = bus.index();
        let limit = self.queues[idx].capacity();

        for _ in 0..limit {
            let Some(frame) = self.queues[idx].try_pop() else {
                break;
            };
            report.drained[idx] += 1;
            self.indicators.set(Indicator::Traffic, true)?;

            if self.mode.is_enabled() {
                self.mirror(&frame, report);
            }

            match self.transmitter.transmit(bus.opposite(), &frame) {
                Ok(()) => {
                    report.forwarded += 1;
                    metrics::counter!("canspy_frames_forwarded_total", "bus" => bus.as_str())
                        .increment(1);
                }
                Err(e) => {
                    report.transmit_failures += 1;
                    let to = bus.opposite().as_str();
                    metrics::counter!("canspy_transmit_failures_total", "bus" => to).increment(1);
                    warn!(from = %bus, to = %bus.opposite(), error = %e, "forward failed");
                }
            }
        }

        let overflows = self.queues[idx].stats().overflows;
        if overflows > self.overflows_seen[idx] {
            let dropped = overflows - self.overflows_seen[idx];
            debug!(%bus, dropped, total = overflows, "queue overflowed");
            metrics::counter!("canspy_queue_overflows_total", "bus" => bus.as_str())
                .increment(dropped);
            self.overflows_seen[idx] = overflows;
        }

        Ok(())
    }

    fn mirror(&mut self, frame: &CanFrame, report: &mut CycleReport) {
        let line = SlcanLine::encode(frame);
        if self.config.dump_frames {
            debug!("{}", frame.dump());
        }

        match self.relay.try_send(line.as_bytes()) {
            Ok(()) => report.relayed += 1,
            Err(RelayError::Busy) => report.relay_dropped += 1,
            Err(e) => warn!(error = %e, "relay submission failed"),
        }
    }
}
