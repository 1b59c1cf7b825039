//! Pipeline wiring

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use can_protocol::BusId;
use capture::{CaptureStats, DebounceLatch, Diagnostics, ReportingMode, SystemClock};
use forwarder::{Forwarder, LogIndicators};
use frame_queue::{FrameQueue, QueueMonitor};
use relay::{
    LogSink, RawSink, RelayError, RelayReceiver, RelayTask, TaskDirectory, FORWARDER_TASK,
    RELAY_TASK,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{Backend, CaptureContext};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Interval between queue statistics records
const STATS_PERIOD: Duration = Duration::from_secs(10);

/// The assembled gateway
pub struct Gateway {
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<(), GatewayError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `stop` completes, the forwarding task fails or the relay
    /// task exits
    pub async fn run_until(self, stop: impl Future<Output = ()>) -> Result<(), GatewayError> {
        let config = self.config;

        let mode = Arc::new(ReportingMode::default());
        let diagnostics = Arc::new(Diagnostics::new());
        let stats = Arc::new(CaptureStats::new());
        let (can1_tx, can1_rx) = FrameQueue::with_capacity(config.queue.capacity)?;
        let (can2_tx, can2_rx) = FrameQueue::with_capacity(config.queue.capacity)?;
        let monitors = [can1_tx.monitor(), can2_tx.monitor()];

        let directory = TaskDirectory::new();
        let spy = directory.register(FORWARDER_TASK, config.relay.inbox_depth)?;
        let snif = directory.register(RELAY_TASK, config.relay.inbox_depth)?;
        let relay_tx = spy.connect(RELAY_TASK)?;
        let relay_rx = snif.listen(FORWARDER_TASK)?;

        let backend = Backend::open(&config.bus)?;
        let forwarder = Forwarder::new(
            config.forwarder.clone(),
            [can1_rx, can2_rx],
            backend.transmitter(),
            LogIndicators::new(),
            mode.clone(),
            diagnostics.clone(),
            relay_tx,
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let threads = backend.start(
            CaptureContext {
                producers: [can1_tx, can2_tx],
                diagnostics,
                stats: stats.clone(),
                waker: forwarder.waker(),
                shutdown: shutdown.clone(),
            },
            &config.bus,
        )?;

        let mut relay = spawn_relay(&config, relay_rx)?;
        let latch = Arc::new(DebounceLatch::new(
            config.debounce,
            SystemClock::default(),
            mode,
        ));
        #[cfg(unix)]
        let button = tokio::spawn(crate::button::watch_button(latch.clone()));
        let reporter = tokio::spawn(report_queues(monitors, stats.clone()));

        info!(
            backend = ?config.bus.backend,
            can1 = %config.bus.can1,
            can2 = %config.bus.can2,
            relay_mode = ?config.relay.mode,
            "gateway running"
        );

        let outcome = tokio::select! {
            result = forwarder.run() => result.map_err(GatewayError::from),
            result = &mut relay => match result {
                Ok(relayed) => relayed.map_err(GatewayError::from),
                Err(e) => Err(e.into()),
            },
            _ = stop => {
                info!("shutdown requested");
                Ok(())
            }
        };

        shutdown.store(true, Ordering::Release);
        relay.abort();
        reporter.abort();
        #[cfg(unix)]
        button.abort();

        tokio::task::spawn_blocking(move || {
            for thread in threads {
                if thread.join().is_err() {
                    warn!("capture thread panicked");
                }
            }
        })
        .await?;

        let snapshot = stats.snapshot();
        info!(
            interrupts = snapshot.interrupts,
            can1 = snapshot.bus_total(BusId::Can1),
            can2 = snapshot.bus_total(BusId::Can2),
            bounces = latch.bounces(),
            "capture statistics"
        );
        outcome
    }
}

fn spawn_relay(
    config: &GatewayConfig,
    receiver: RelayReceiver,
) -> Result<JoinHandle<Result<(), RelayError>>, GatewayError> {
    let relay_config = config.relay.clone();
    let handle = match &config.serial.device {
        Some(device) => {
            let sink = RawSink::open_serial(device, config.serial.baud_rate)?;
            info!(%device, baud_rate = config.serial.baud_rate, "relaying to serial link");
            tokio::spawn(RelayTask::new(relay_config, receiver, sink).run())
        }
        None => {
            info!("relaying to log");
            tokio::spawn(RelayTask::new(relay_config, receiver, LogSink).run())
        }
    };
    Ok(handle)
}

async fn report_queues(monitors: [QueueMonitor; 2], stats: Arc<CaptureStats>) {
    let mut interval = tokio::time::interval(STATS_PERIOD);
    interval.tick().await;
    loop {
        interval.tick().await;
        for (bus, monitor) in BusId::ALL.iter().zip(&monitors) {
            let queue = monitor.stats();
            debug!(
                %bus,
                len = queue.len,
                fill = queue.fill_ratio(),
                overflows = queue.overflows,
                written = queue.total_written,
                "queue"
            );
        }
        debug!(interrupts = stats.snapshot().interrupts, "capture");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_protocol::{BusErrorCode, CanEvent, CanFrame, RxFifo, VirtualBus};
    use capture::{BusCapture, CaptureHandler, DebounceConfig, ManualClock};
    use forwarder::{ForwarderConfig, Indicator};
    use relay::{PollOutcome, RelayConfig};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_frame_crosses_pipeline() {
        let hw = VirtualBus::new();
        let mode = Arc::new(ReportingMode::default());
        let diagnostics = Arc::new(Diagnostics::new());
        let stats = Arc::new(CaptureStats::new());
        let (p1, c1) = FrameQueue::with_default_capacity();
        let (p2, c2) = FrameQueue::with_default_capacity();

        let directory = TaskDirectory::new();
        let spy = directory.register(FORWARDER_TASK, 4).unwrap();
        let snif = directory.register(RELAY_TASK, 4).unwrap();
        let relay_tx = spy.connect(RELAY_TASK).unwrap();
        let relay_rx = snif.listen(FORWARDER_TASK).unwrap();

        let mut handler = CaptureHandler::new(
            BusCapture::new(
                BusId::Can1,
                hw.rx(BusId::Can1),
                p1,
                diagnostics.clone(),
                stats.clone(),
            ),
            BusCapture::new(
                BusId::Can2,
                hw.rx(BusId::Can2),
                p2,
                diagnostics.clone(),
                stats.clone(),
            ),
        );
        let mut forwarder = Forwarder::new(
            ForwarderConfig::default(),
            [c1, c2],
            hw.clone(),
            LogIndicators::new(),
            mode.clone(),
            diagnostics.clone(),
            relay_tx,
        );
        let latch =
            DebounceLatch::new(DebounceConfig::default(), ManualClock::new(0), mode.clone());
        let (writer, mut reader) = tokio::io::duplex(64);
        let mut relay = RelayTask::new(RelayConfig::serial(), relay_rx, RawSink::new(writer));

        assert!(latch.on_edge());
        let frame = CanFrame::standard(0x123, &[0xAA, 0xBB]).unwrap();
        hw.inject(BusId::Can1, RxFifo::Fifo0, frame);
        handler.on_event(BusId::Can1, CanEvent::MessagePending(RxFifo::Fifo0));

        let report = forwarder.run_cycle().unwrap();
        assert_eq!(report.relayed, 1);
        assert_eq!(hw.transmitted(BusId::Can2), vec![frame]);
        assert!(forwarder.indicators().is_on(Indicator::Mode));

        assert_eq!(relay.poll_once().await.unwrap(), PollOutcome::Delivered(10));
        let mut line = [0u8; 10];
        reader.read_exact(&mut line).await.unwrap();
        assert_eq!(&line, b"t1232aabb\r");

        // A bus error silences the mirror but not the bridge
        handler.on_event(BusId::Can2, CanEvent::Error(BusErrorCode(0x80)));
        hw.inject(BusId::Can2, RxFifo::Fifo1, frame);
        handler.on_event(BusId::Can2, CanEvent::FifoFull(RxFifo::Fifo1));

        let report = forwarder.run_cycle().unwrap();
        assert!(report.faults[BusId::Can2.index()].is_some());
        assert_eq!(report.relayed, 0);
        assert!(!mode.is_enabled());
        assert!(!forwarder.indicators().is_on(Indicator::Mode));
        assert_eq!(hw.transmitted(BusId::Can1), vec![frame]);
        assert_eq!(relay.poll_once().await.unwrap(), PollOutcome::Idle);

        assert_eq!(stats.snapshot().interrupts, 3);
    }

    #[tokio::test]
    async fn test_gateway_runs_on_virtual_backend() {
        let config = GatewayConfig::from_toml(
            r#"
            [bus]
            backend = "virtual"
            virtual_period_ms = 5

            [relay]
            mode = "blocking"
            "#,
        )
        .unwrap();

        Gateway::new(config)
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_queue_capacity_rejected() {
        let mut config = GatewayConfig::default();
        config.bus.backend = crate::config::BusBackend::Virtual;
        config.queue.capacity = 1;

        let result = Gateway::new(config).run_until(async {}).await;
        assert!(matches!(result, Err(GatewayError::Queue(_))));
    }
}
