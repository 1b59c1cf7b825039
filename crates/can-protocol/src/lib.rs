//! CAN Protocol Primitives
//!
//! Frame model, hardware event taxonomy and the SLCAN text encoding used to
//! mirror traffic to a monitor link. Bus hardware is reached through the
//! [`RxHardware`] and [`BusTransmitter`] traits so the pipeline can run on
//! SocketCAN, real controllers or the in-memory [`VirtualBus`].

mod bus;
mod error;
mod event;
mod frame;
mod slcan;

pub use bus::{BusTransmitter, RxHardware, VirtualBus, VirtualRx};
pub use error::CanError;
pub use event::{BusErrorCode, CanEvent, CanEventKind, TxMailbox};
pub use frame::{BusId, CanFrame, FrameDump, RxFifo};
pub use slcan::{SlcanLine, MAX_LINE_LEN};

pub use embedded_can::{ExtendedId, Id, StandardId};

/// Maximum number of data bytes in a classic CAN frame
pub const MAX_DLC: usize = 8;

/// Depth of one hardware receive FIFO (frames drained on a FIFO-full event)
pub const HW_FIFO_DEPTH: usize = 3;
