//! CAN Controller Events

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::RxFifo;

/// Controller-specific error code carried by abort and error events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BusErrorCode(pub u32);

impl fmt::Display for BusErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Transmit mailbox of a CAN controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxMailbox {
    Mailbox0,
    Mailbox1,
    Mailbox2,
}

/// Event raised by the bus hardware, delivered at interrupt priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanEvent {
    /// One frame is waiting in the receive FIFO
    MessagePending(RxFifo),
    /// The receive FIFO is full; drain what it holds
    FifoFull(RxFifo),
    /// A pending transmission was aborted
    TransmitAbort(TxMailbox, BusErrorCode),
    /// Generic bus error (bus-off, stuff error, ...)
    Error(BusErrorCode),
}

impl CanEvent {
    pub fn kind(&self) -> CanEventKind {
        match self {
            CanEvent::MessagePending(RxFifo::Fifo0) => CanEventKind::Fifo0Pending,
            CanEvent::FifoFull(RxFifo::Fifo0) => CanEventKind::Fifo0Full,
            CanEvent::MessagePending(RxFifo::Fifo1) => CanEventKind::Fifo1Pending,
            CanEvent::FifoFull(RxFifo::Fifo1) => CanEventKind::Fifo1Full,
            CanEvent::TransmitAbort(TxMailbox::Mailbox0, _) => CanEventKind::Mailbox0Abort,
            CanEvent::TransmitAbort(TxMailbox::Mailbox1, _) => CanEventKind::Mailbox1Abort,
            CanEvent::TransmitAbort(TxMailbox::Mailbox2, _) => CanEventKind::Mailbox2Abort,
            CanEvent::Error(_) => CanEventKind::Error,
        }
    }
}

/// Payload-free event discriminant, used to index per-kind counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanEventKind {
    Fifo0Pending,
    Fifo0Full,
    Fifo1Pending,
    Fifo1Full,
    Mailbox0Abort,
    Mailbox1Abort,
    Mailbox2Abort,
    Error,
}

impl CanEventKind {
    pub const COUNT: usize = 8;

    pub const ALL: [CanEventKind; Self::COUNT] = [
        CanEventKind::Fifo0Pending,
        CanEventKind::Fifo0Full,
        CanEventKind::Fifo1Pending,
        CanEventKind::Fifo1Full,
        CanEventKind::Mailbox0Abort,
        CanEventKind::Mailbox1Abort,
        CanEventKind::Mailbox2Abort,
        CanEventKind::Error,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CanEventKind::Fifo0Pending => "fifo0_pending",
            CanEventKind::Fifo0Full => "fifo0_full",
            CanEventKind::Fifo1Pending => "fifo1_pending",
            CanEventKind::Fifo1Full => "fifo1_full",
            CanEventKind::Mailbox0Abort => "mailbox0_abort",
            CanEventKind::Mailbox1Abort => "mailbox1_abort",
            CanEventKind::Mailbox2Abort => "mailbox2_abort",
            CanEventKind::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_indices_are_dense() {
        for (i, kind) in CanEventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(
            CanEvent::FifoFull(RxFifo::Fifo1).kind(),
            CanEventKind::Fifo1Full
        );
        assert_eq!(
            CanEvent::TransmitAbort(TxMailbox::Mailbox2, BusErrorCode(4)).kind(),
            CanEventKind::Mailbox2Abort
        );
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(BusErrorCode(0x1F).to_string(), "0x0000001f");
    }
}
