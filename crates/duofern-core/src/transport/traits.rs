//! Serial transport abstraction.
//!
//! Defines the `StickTransport` trait for the transceiver link, allowing a
//! serialport-backed production implementation and a mock for unit testing.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::frame::Frame;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("serial port {port} unavailable: {message}")]
    PortUnavailable { port: String, message: String },

    #[error("permission denied opening {port}")]
    PermissionDenied { port: String },

    #[error("port is not open")]
    PortClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract transceiver link.
///
/// The link is fixed-width framed: 22 bytes in, 22 bytes out, no sync word.
/// The [`Frame`] type makes short and long writes unrepresentable.
pub trait StickTransport: Send {
    /// Open the endpoint at 115200 baud, 8-N-1.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Close the endpoint. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Write one frame to the wire.
    fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Block up to `timeout` for the next complete inbound frame.
    ///
    /// `Ok(None)` means the timeout elapsed without a full frame arriving.
    fn poll_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, TransportError>;

    /// Drop any partially assembled inbound bytes.
    fn reset(&mut self);
}
