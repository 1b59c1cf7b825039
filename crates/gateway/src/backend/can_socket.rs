//! Linux SocketCAN backend
//!
//! One raw socket per interface, shared by that bus's reader thread and the
//! transmitter. A socket does not receive its own transmissions, so frames
//! forwarded onto a bus are not captured again from it.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use can_protocol::{
    BusErrorCode, BusId, BusTransmitter, CanError, CanEvent, CanFrame, RxFifo, TxMailbox,
    HW_FIFO_DEPTH,
};
use capture::BusCapture;
use socketcan::{
    CanError as SocketCanError, CanErrorFrame, CanFrame as SocketFrame, CanSocket, EmbeddedFrame,
    Frame, Socket, SocketOptions,
};
use tokio::sync::Notify;
use tracing::{debug, error, info, trace, warn};

use super::StagedRx;
use crate::error::GatewayError;

/// Sockets for both buses
pub struct SocketCanPair {
    interfaces: [String; 2],
    sockets: [Arc<CanSocket>; 2],
}

impl SocketCanPair {
    pub fn open(can1: &str, can2: &str, read_timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            interfaces: [can1.to_string(), can2.to_string()],
            sockets: [
                Arc::new(open_socket(can1, read_timeout)?),
                Arc::new(open_socket(can2, read_timeout)?),
            ],
        })
    }

    pub fn transmitter(&self) -> SocketCanTransmitter {
        SocketCanTransmitter {
            sockets: self.sockets.clone(),
        }
    }

    /// Start the reader thread of the bus `capture` belongs to
    pub fn spawn_reader(
        &self,
        mut capture: BusCapture<StagedRx>,
        waker: Arc<Notify>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, GatewayError> {
        let bus = capture.bus();
        let socket = self.sockets[bus.index()].clone();
        let interface = self.interfaces[bus.index()].clone();

        let handle = thread::Builder::new()
            .name(format!("canspy-rx-{}", interface))
            .spawn(move || {
                info!(%bus, %interface, "reader started");
                while !shutdown.load(Ordering::Acquire) {
                    let frame = match socket.read_frame() {
                        Ok(frame) => frame,
                        Err(e)
                            if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                        {
                            continue
                        }
                        Err(e) => {
                            error!(%bus, %interface, error = %e, "read failed, reader stopping");
                            break;
                        }
                    };

                    if let Some(event) = classify(capture.hardware_mut(), frame) {
                        capture.on_event(event);
                        waker.notify_one();
                    }
                }
                debug!(%bus, "reader stopped");
            })?;
        Ok(handle)
    }
}

fn open_socket(interface: &str, read_timeout: Duration) -> Result<CanSocket, GatewayError> {
    let socket = CanSocket::open(interface)
        .map_err(|e| GatewayError::Backend(format!("{}: {}", interface, e)))?;
    socket.set_read_timeout(read_timeout)?;
    socket.set_error_filter_accept_all()?;
    Ok(socket)
}

/// Turn a received socket frame into the controller event it stands for
fn classify(staged: &mut StagedRx, frame: SocketFrame) -> Option<CanEvent> {
    let code = BusErrorCode(frame.raw_id());
    let received = match frame {
        SocketFrame::Data(data) => CanFrame::new(data.id(), data.data()),
        SocketFrame::Remote(remote) => CanFrame::new_remote(remote.id(), remote.dlc()),
        SocketFrame::Error(err) => return Some(error_event(err, code)),
    };

    let Some(received) = received else {
        warn!("unrepresentable frame skipped");
        return None;
    };
    if !staged.stage(received) {
        trace!("receive fifo overrun");
    }

    Some(if staged.len() >= HW_FIFO_DEPTH {
        CanEvent::FifoFull(RxFifo::Fifo0)
    } else {
        CanEvent::MessagePending(RxFifo::Fifo0)
    })
}

fn error_event(frame: CanErrorFrame, code: BusErrorCode) -> CanEvent {
    match SocketCanError::from(frame) {
        SocketCanError::TransmitTimeout => CanEvent::TransmitAbort(TxMailbox::Mailbox0, code),
        _ => CanEvent::Error(code),
    }
}

/// Transmit side of a [`SocketCanPair`]
pub struct SocketCanTransmitter {
    sockets: [Arc<CanSocket>; 2],
}

impl BusTransmitter for SocketCanTransmitter {
    fn transmit(&mut self, bus: BusId, frame: &CanFrame) -> Result<(), CanError> {
        let outgoing = if frame.is_remote() {
            SocketFrame::new_remote(frame.id(), frame.dlc())
        } else {
            SocketFrame::new(frame.id(), frame.data())
        }
        .ok_or_else(|| CanError::InvalidFrame(format!("{}", frame.dump())))?;

        self.sockets[bus.index()]
            .write_frame(&outgoing)
            .map_err(|e| transmit_error(bus, e))
    }
}

/// Map a socket write failure. A full interface queue means no free mailbox;
/// the kernel reports ENETDOWN while the controller is bus-off.
fn transmit_error(bus: BusId, e: std::io::Error) -> CanError {
    match e.raw_os_error() {
        Some(libc::ENOBUFS) => CanError::MailboxFull(bus),
        Some(libc::ENETDOWN) => CanError::BusOff(bus),
        _ if e.kind() == ErrorKind::WouldBlock => CanError::MailboxFull(bus),
        _ => CanError::Transmit {
            bus,
            reason: e.to_string(),
        },
    }
}
