//! Reporting toggle input
//!
//! On a host there is no push button: each SIGUSR1 counts as one edge and
//! goes through the same debounce latch.

use std::sync::Arc;

use capture::{DebounceLatch, MonotonicClock};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info};

use crate::error::GatewayError;

/// Feed SIGUSR1 deliveries into `latch` until the signal stream ends
pub async fn watch_button<C: MonotonicClock>(
    latch: Arc<DebounceLatch<C>>,
) -> Result<(), GatewayError> {
    let mut edges = signal(SignalKind::user_defined1())?;
    info!("send SIGUSR1 to toggle reporting");

    while edges.recv().await.is_some() {
        if latch.on_edge() {
            debug!("button edge accepted");
        } else {
            debug!(bounces = latch.bounces(), "button edge ignored as bounce");
        }
    }
    Ok(())
}
