//! Packed frame storage
//!
//! A frame is stored as two atomic words so that a slot can be overwritten by
//! the producer while a stale consumer is reading it without a data race; the
//! consumer discards what it read if its claim on the slot fails.
//!
//! word0: bits 0-28 identifier, bit 30 remote, bit 31 extended, bits 32-35 length
//! word1: data bytes, little endian

use std::sync::atomic::{AtomicU64, Ordering};

use can_protocol::CanFrame;

const ID_MASK: u64 = 0x1FFF_FFFF;
const REMOTE_BIT: u64 = 1 << 30;
const EXTENDED_BIT: u64 = 1 << 31;
const DLC_SHIFT: u32 = 32;

#[derive(Debug, Default)]
pub(crate) struct Slot {
    word0: AtomicU64,
    word1: AtomicU64,
}

impl Slot {
    pub(crate) fn store(&self, frame: &CanFrame) {
        let mut word0 = frame.raw_id() as u64 & ID_MASK;
        if frame.is_remote() {
            word0 |= REMOTE_BIT;
        }
        if frame.is_extended() {
            word0 |= EXTENDED_BIT;
        }
        word0 |= (frame.dlc() as u64) << DLC_SHIFT;

        let mut data = [0u8; 8];
        data[..frame.data().len()].copy_from_slice(frame.data());

        self.word0.store(word0, Ordering::Relaxed);
        self.word1.store(u64::from_le_bytes(data), Ordering::Relaxed);
    }

    pub(crate) fn load(&self) -> [u64; 2] {
        [
            self.word0.load(Ordering::Relaxed),
            self.word1.load(Ordering::Relaxed),
        ]
    }
}

/// Rebuild a frame from words returned by [`Slot::load`]
pub(crate) fn unpack(words: [u64; 2]) -> Option<CanFrame> {
    let [word0, word1] = words;
    CanFrame::from_parts(
        (word0 & ID_MASK) as u32,
        word0 & EXTENDED_BIT != 0,
        word0 & REMOTE_BIT != 0,
        ((word0 >> DLC_SHIFT) & 0xF) as u8,
        word1.to_le_bytes(),
    )
}
