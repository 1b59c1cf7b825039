//! CAN Frame Model

use std::fmt;

use embedded_can::{ExtendedId, Id, StandardId};
use serde::{Deserialize, Serialize};

use crate::MAX_DLC;

/// One of the two monitored buses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusId {
    /// First bus (CAN1)
    Can1,
    /// Second bus (CAN2)
    Can2,
}

impl BusId {
    /// Both buses, in drain order
    pub const ALL: [BusId; 2] = [BusId::Can1, BusId::Can2];

    /// The bus a frame received here is forwarded to
    pub fn opposite(self) -> BusId {
        match self {
            BusId::Can1 => BusId::Can2,
            BusId::Can2 => BusId::Can1,
        }
    }

    /// Zero-based index, usable for per-bus arrays
    pub fn index(self) -> usize {
        match self {
            BusId::Can1 => 0,
            BusId::Can2 => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BusId::Can1 => "CAN1",
            BusId::Can2 => "CAN2",
        }
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware receive FIFO of a CAN controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RxFifo {
    Fifo0,
    Fifo1,
}

impl RxFifo {
    pub fn index(self) -> usize {
        match self {
            RxFifo::Fifo0 => 0,
            RxFifo::Fifo1 => 1,
        }
    }
}

/// Classic CAN frame: identifier, remote flag, length and up to 8 data bytes.
///
/// The declared length never exceeds [`MAX_DLC`]. Data bytes past the length
/// are kept zeroed and never exposed, so they cannot leak into a transmit or
/// an encoded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanFrame {
    id: Id,
    remote: bool,
    dlc: u8,
    data: [u8; MAX_DLC],
}

impl CanFrame {
    /// Create a data frame. Returns `None` if `data` is longer than 8 bytes.
    pub fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DLC {
            return None;
        }
        let mut payload = [0u8; MAX_DLC];
        payload[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            remote: false,
            dlc: data.len() as u8,
            data: payload,
        })
    }

    /// Create a remote (request) frame with the given length code
    pub fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_DLC {
            return None;
        }
        Some(Self {
            id: id.into(),
            remote: true,
            dlc: dlc as u8,
            data: [0u8; MAX_DLC],
        })
    }

    /// Standard (11-bit) data frame from a raw identifier
    pub fn standard(id: u16, data: &[u8]) -> Option<Self> {
        Self::new(StandardId::new(id)?, data)
    }

    /// Extended (29-bit) data frame from a raw identifier
    pub fn extended(id: u32, data: &[u8]) -> Option<Self> {
        Self::new(ExtendedId::new(id)?, data)
    }

    /// Rebuild a frame from its raw fields, as found in controller registers
    /// or packed storage. Fails on an out-of-range identifier or length.
    pub fn from_parts(
        raw_id: u32,
        extended: bool,
        remote: bool,
        dlc: u8,
        data: [u8; MAX_DLC],
    ) -> Option<Self> {
        let id: Id = if extended {
            ExtendedId::new(raw_id)?.into()
        } else {
            StandardId::new(u16::try_from(raw_id).ok()?)?.into()
        };
        if remote {
            return Self::new_remote(id, dlc as usize);
        }
        Self::new(id, data.get(..dlc as usize)?)
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Identifier as a plain integer, without the format flag
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn dlc(&self) -> usize {
        self.dlc as usize
    }

    /// Payload bytes. Always empty for remote frames.
    pub fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[..self.dlc as usize]
        }
    }

    /// Human-readable rendering for debug logs, e.g. `t@291 [2] aa bb`
    pub fn dump(&self) -> FrameDump<'_> {
        FrameDump(self)
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        CanFrame::new(id, data)
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        CanFrame::new_remote(id, dlc)
    }

    fn is_extended(&self) -> bool {
        CanFrame::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        CanFrame::data(self)
    }
}

/// Debug view of a frame: identifier in decimal, length, then bytes in hex
pub struct FrameDump<'a>(&'a CanFrame);

impl fmt::Display for FrameDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.0;
        let lead = if frame.is_extended() { 'T' } else { 't' };
        write!(f, "{}@{} [{}]", lead, frame.raw_id(), frame.dlc())?;
        for byte in frame.data() {
            write!(f, " {:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_frame_rejects_long_payload() {
        assert!(CanFrame::standard(0x100, &[0; 9]).is_none());
        assert!(CanFrame::standard(0x100, &[0; 8]).is_some());
    }

    #[test]
    fn test_identifier_ranges() {
        assert!(CanFrame::standard(0x7FF, &[]).is_some());
        assert!(CanFrame::standard(0x800, &[]).is_none());
        assert!(CanFrame::extended(0x1FFF_FFFF, &[]).is_some());
        assert!(CanFrame::extended(0x2000_0000, &[]).is_none());
    }

    #[test]
    fn test_remote_frame_has_no_payload() {
        let frame = CanFrame::new_remote(StandardId::new(0x42).unwrap(), 4).unwrap();
        assert!(frame.is_remote());
        assert_eq!(frame.dlc(), 4);
        assert!(frame.data().is_empty());
    }

    #[test]
    fn test_from_parts_matches_constructors() {
        let mut data = [0u8; MAX_DLC];
        data[..3].copy_from_slice(&[1, 2, 3]);
        let frame = CanFrame::from_parts(0x1ABCDEF, true, false, 3, data).unwrap();
        assert_eq!(frame, CanFrame::extended(0x1ABCDEF, &[1, 2, 3]).unwrap());
        assert!(CanFrame::from_parts(0x800, false, false, 0, data).is_none());
        assert!(CanFrame::from_parts(0x10, false, false, 9, data).is_none());
    }

    #[test]
    fn test_opposite_bus() {
        assert_eq!(BusId::Can1.opposite(), BusId::Can2);
        assert_eq!(BusId::Can2.opposite(), BusId::Can1);
    }

    #[test]
    fn test_dump_format() {
        let frame = CanFrame::standard(0x123, &[0xAA, 0xBB]).unwrap();
        assert_eq!(frame.dump().to_string(), "t@291 [2] aa bb");

        let frame = CanFrame::extended(0x100, &[]).unwrap();
        assert_eq!(frame.dump().to_string(), "T@256 [0]");
    }
}
