//! Wire frame handling.
//!
//! Every unit on the serial link is exactly 22 bytes, rendered as 44
//! uppercase hex characters for protocol reasoning. There is no sync word
//! and no length prefix: framing is purely fixed-width, so a single dropped
//! byte desynchronizes the stream until the port is reopened.

use std::fmt;

use thiserror::Error;

use super::device::DeviceCode;

/// Frame length on the wire, in bytes.
pub const FRAME_LEN: usize = 22;

/// Frame length in hex characters.
pub const FRAME_HEX_LEN: usize = 2 * FRAME_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame must be {FRAME_LEN} bytes, got {0}")]
    Length(usize),

    #[error("invalid hex digit at offset {0}")]
    Hex(usize),
}

/// A single 22-byte DuoFern frame.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    /// Wrap a fixed-size byte array.
    pub const fn from_array(bytes: [u8; FRAME_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a frame from a byte slice, rejecting short and long input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_LEN {
            return Err(FrameError::Length(bytes.len()));
        }
        let mut array = [0u8; FRAME_LEN];
        array.copy_from_slice(bytes);
        Ok(Self { bytes: array })
    }

    /// Parse the 44-character hex rendering, case-insensitive.
    pub fn from_hex(hex: &str) -> Result<Self, FrameError> {
        let digits = hex.as_bytes();
        if digits.len() != FRAME_HEX_LEN {
            return Err(FrameError::Length(digits.len() / 2));
        }
        let digit = |offset: usize| -> Result<u8, FrameError> {
            (digits[offset] as char)
                .to_digit(16)
                .map(|d| d as u8)
                .ok_or(FrameError::Hex(offset))
        };
        let mut bytes = [0u8; FRAME_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (digit(2 * i)? << 4) | digit(2 * i + 1)?;
        }
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// Uppercase hex rendering, 44 characters.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(FRAME_HEX_LEN);
        for b in &self.bytes {
            out.push_str(&format!("{b:02X}"));
        }
        out
    }

    /// Classify an inbound frame by its leading bytes.
    pub fn kind(&self) -> FrameKind {
        if self.bytes[0] == 0x81 {
            return FrameKind::Ack;
        }
        if self.bytes[0] == 0x06 {
            match self.bytes[1] {
                0x02 => return FrameKind::Paired(self.device_code()),
                0x03 => return FrameKind::Unpaired(self.device_code()),
                _ => {}
            }
        }
        FrameKind::Message
    }

    /// Device code carried at hex offset 30..36 (status reports and
    /// pairing notifications).
    pub fn device_code(&self) -> DeviceCode {
        DeviceCode::from_array([self.bytes[15], self.bytes[16], self.bytes[17]])
    }

    /// True for device status reports, which begin `0F FF 0F`.
    pub fn is_status(&self) -> bool {
        self.bytes[0] == 0x0F && self.bytes[1] == 0xFF && self.bytes[2] == 0x0F
    }

    /// Status format byte (hex offset 6..8).
    pub fn format_byte(&self) -> u8 {
        self.bytes[3]
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.to_hex())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Inbound frame classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Acknowledgement from the transceiver.
    Ack,
    /// Pairing notification.
    Paired(DeviceCode),
    /// Unpairing notification.
    Unpaired(DeviceCode),
    /// Device-originated message, to be auto-ACKed.
    Message,
}

/// Fixed-width frame assembler.
///
/// Inbound bytes accumulate until 22 are available, then the leading 22 are
/// detached as one frame. No resynchronization is attempted.
#[derive(Debug, Default)]
pub struct Framer {
    buf: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.buf.len() < FRAME_LEN {
            return None;
        }
        let rest = self.buf.split_off(FRAME_LEN);
        let head = std::mem::replace(&mut self.buf, rest);
        let mut bytes = [0u8; FRAME_LEN];
        bytes.copy_from_slice(&head);
        Some(Frame { bytes })
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
