//! SLCAN Line Encoding
//!
//! One frame per line:
//!
//! | Field      | Standard      | Extended      |
//! |------------|---------------|---------------|
//! | lead       | `t` / `r`     | `T` / `R`     |
//! | identifier | 3 hex digits  | 8 hex digits  |
//! | length     | 1 decimal digit               |
//! | data       | 2 hex digits per byte         |
//! | terminator | `\r`                          |
//!
//! `r`/`R` mark remote frames, which carry no data digits.

use std::fmt;

use crate::frame::CanFrame;

/// Longest possible line: lead + 8 id digits + length + 16 data digits + CR
pub const MAX_LINE_LEN: usize = 1 + 8 + 1 + 2 * crate::MAX_DLC + 1;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// An encoded SLCAN line held on the stack
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SlcanLine {
    buf: [u8; MAX_LINE_LEN],
    len: usize,
}

impl SlcanLine {
    /// Encode a frame. Never fails: every valid [`CanFrame`] has a line form.
    pub fn encode(frame: &CanFrame) -> Self {
        let mut line = SlcanLine {
            buf: [0u8; MAX_LINE_LEN],
            len: 0,
        };

        let lead = match (frame.is_extended(), frame.is_remote()) {
            (false, false) => b't',
            (false, true) => b'r',
            (true, false) => b'T',
            (true, true) => b'R',
        };
        line.push(lead);

        let id_digits = if frame.is_extended() { 8 } else { 3 };
        line.push_hex(frame.raw_id(), id_digits);

        line.push(b'0' + frame.dlc() as u8);

        for &byte in frame.data() {
            line.push_hex(byte as u32, 2);
        }

        line.push(b'\r');
        line
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.len] = byte;
        self.len += 1;
    }

    fn push_hex(&mut self, value: u32, digits: usize) {
        for shift in (0..digits).rev() {
            let nibble = (value >> (shift * 4)) & 0xF;
            self.push(HEX_DIGITS[nibble as usize]);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII hex digits, lead letters and CR are ever written
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for SlcanLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SlcanLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlcanLine({:?})", self.as_str())
    }
}
