//! Mock transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{StickTransport, TransportError};
use crate::protocol::frame::Frame;

/// Mock transport for exercising the session without a serial port.
///
/// Cloning shares the underlying queues, so a test can keep a handle while
/// the session owns the transport. `poll_frame` never blocks: an empty
/// inbound queue reports a timeout immediately.
#[derive(Clone)]
pub struct MockTransport {
    inbound: Arc<Mutex<VecDeque<Frame>>>,
    writes: Arc<Mutex<Vec<Frame>>>,
    open: Arc<Mutex<bool>>,
    connected: Arc<Mutex<bool>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            writes: Arc::new(Mutex::new(Vec::new())),
            open: Arc::new(Mutex::new(false)),
            connected: Arc::new(Mutex::new(true)),
        }
    }

    /// Queue a frame to be returned on a later poll.
    pub fn queue_frame(&self, frame: Frame) {
        self.inbound.lock().unwrap().push_back(frame);
    }

    /// Queue a frame from its hex rendering.
    pub fn queue_hex(&self, hex: &str) {
        self.queue_frame(Frame::from_hex(hex).expect("valid hex frame"));
    }

    /// Queue a plain ACK frame.
    pub fn queue_ack(&self) {
        self.queue_frame(crate::protocol::constants::ACK_FRAME);
    }

    /// All captured writes, in order.
    pub fn writes(&self) -> Vec<Frame> {
        self.writes.lock().unwrap().clone()
    }

    /// Hex renderings of all captured writes.
    pub fn writes_hex(&self) -> Vec<String> {
        self.writes().iter().map(Frame::to_hex).collect()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Simulate the stick disappearing: further opens and writes fail.
    pub fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }

    pub fn reconnect(&self) {
        *self.connected.lock().unwrap() = true;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StickTransport for MockTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::PortUnavailable {
                port: "mock".to_string(),
                message: "disconnected".to_string(),
            });
        }
        *self.open.lock().unwrap() = true;
        Ok(())
    }

    fn close(&mut self) {
        *self.open.lock().unwrap() = false;
    }

    fn is_open(&self) -> bool {
        *self.open.lock().unwrap()
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::PortClosed);
        }
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Io(std::io::Error::other("disconnected")));
        }
        self.writes.lock().unwrap().push(*frame);
        Ok(())
    }

    fn poll_frame(&mut self, _timeout: Duration) -> Result<Option<Frame>, TransportError> {
        if !self.is_open() {
            return Err(TransportError::PortClosed);
        }
        Ok(self.inbound.lock().unwrap().pop_front())
    }

    fn reset(&mut self) {}
}
