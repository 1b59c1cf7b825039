//! Virtual bus backend with a synthetic traffic source

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use can_protocol::{BusId, CanEvent, CanFrame, RxFifo, VirtualBus, VirtualRx};
use capture::CaptureHandler;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::error::GatewayError;

/// Frame for tick `n`: alternates between the buses, id 0x100 on CAN1 and
/// 0x200 on CAN2, the tick counter as payload.
pub fn synthetic_frame(n: u32) -> Option<(BusId, CanFrame)> {
    let bus = if n % 2 == 0 { BusId::Can1 } else { BusId::Can2 };
    let id = 0x100 * (bus.index() as u16 + 1);
    CanFrame::standard(id, &n.to_be_bytes()).map(|frame| (bus, frame))
}

/// Start the thread that plays the controllers of a [`VirtualBus`]: every
/// `period` it places one synthetic frame in a receive FIFO, raises the
/// capture event and discards what the forwarder transmitted.
pub fn spawn_simulated_traffic(
    bus: VirtualBus,
    mut handler: CaptureHandler<VirtualRx>,
    period: Duration,
    waker: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, GatewayError> {
    let handle = thread::Builder::new()
        .name("canspy-virtual".to_string())
        .spawn(move || {
            debug!(period_ms = period.as_millis() as u64, "virtual traffic started");
            let mut tick: u32 = 0;
            while !shutdown.load(Ordering::Acquire) {
                thread::sleep(period);

                if let Some((source, frame)) = synthetic_frame(tick) {
                    if bus.inject(source, RxFifo::Fifo0, frame) {
                        handler.on_event(source, CanEvent::MessagePending(RxFifo::Fifo0));
                        waker.notify_one();
                    }
                }

                for target in BusId::ALL {
                    let sent = bus.take_transmitted(target);
                    if !sent.is_empty() {
                        trace!(bus = %target, frames = sent.len(), "virtual transmissions");
                    }
                }
                tick = tick.wrapping_add(1);
            }
            debug!("virtual traffic stopped");
        })?;
    Ok(handle)
}
