//! serialport-based transport implementation.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serialport::{DataBits, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use super::traits::{StickTransport, TransportError};
use crate::protocol::constants::BAUD_RATE;
use crate::protocol::frame::{Frame, Framer};

const READ_CHUNK: usize = 256;
const READ_SLICE: Duration = Duration::from_millis(100);

/// Serial link to the DuoFern USB stick.
pub struct SerialStickTransport {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
    framer: Framer,
}

impl SerialStickTransport {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            port: None,
            framer: Framer::new(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn map_open_error(&self, error: serialport::Error) -> TransportError {
        match error.kind {
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                TransportError::PermissionDenied {
                    port: self.port_name.clone(),
                }
            }
            _ => TransportError::PortUnavailable {
                port: self.port_name.clone(),
                message: error.to_string(),
            },
        }
    }
}

impl StickTransport for SerialStickTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let port = serialport::new(&self.port_name, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_SLICE)
            .open()
            .map_err(|e| self.map_open_error(e))?;
        info!(port = %self.port_name, baud = BAUD_RATE, "serial port opened");
        self.framer.clear();
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!(port = %self.port_name, "serial port closed");
        }
        self.framer.clear();
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::PortClosed)?;
        port.write_all(frame.bytes())?;
        port.flush()?;
        debug!(frame = %frame, "frame written");
        Ok(())
    }

    fn poll_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, TransportError> {
        if let Some(frame) = self.framer.next_frame() {
            return Ok(Some(frame));
        }
        let port = self.port.as_mut().ok_or(TransportError::PortClosed)?;
        let deadline = Instant::now() + timeout;
        let mut scratch = [0u8; READ_CHUNK];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            port.set_timeout(remaining.min(READ_SLICE))
                .map_err(|e| TransportError::Io(io::Error::other(e.to_string())))?;
            match port.read(&mut scratch) {
                Ok(0) => {}
                Ok(n) => {
                    self.framer.push(&scratch[..n]);
                    if let Some(frame) = self.framer.next_frame() {
                        return Ok(Some(frame));
                    }
                }
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn reset(&mut self) {
        self.framer.clear();
    }
}
