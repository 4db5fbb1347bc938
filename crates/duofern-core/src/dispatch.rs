//! ACK-gated outbound queue.
//!
//! At most one frame is in flight per session. The next queued frame goes
//! out only after an ACK-classified frame arrives or the 5 second timer
//! expires. A timed-out frame is never retransmitted: the protocol carries
//! no idempotency guarantee and a repeated command could double-actuate a
//! physical device.

use std::collections::VecDeque;
use std::time::Instant;

use crate::protocol::constants::ACK_TIMEOUT;
use crate::protocol::frame::Frame;

#[derive(Debug)]
struct InFlight {
    frame: Frame,
    deadline: Instant,
}

/// FIFO outbound queue with single-frame ACK gating.
///
/// The gate is open while the session is `Ready`; submissions at any other
/// time accumulate.
#[derive(Debug, Default)]
pub struct Dispatcher {
    queue: VecDeque<Frame>,
    in_flight: Option<InFlight>,
    gate_open: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, frame: Frame) {
        self.queue.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_none()
    }

    pub fn set_gate(&mut self, open: bool) {
        self.gate_open = open;
    }

    pub fn in_flight(&self) -> Option<&Frame> {
        self.in_flight.as_ref().map(|f| &f.frame)
    }

    /// Next frame to put on the wire, if the gate is open and nothing is
    /// awaiting its ACK. Arms the ACK timer.
    pub fn next_to_send(&mut self, now: Instant) -> Option<Frame> {
        if !self.gate_open || self.in_flight.is_some() {
            return None;
        }
        let frame = self.queue.pop_front()?;
        self.in_flight = Some(InFlight {
            frame,
            deadline: now + ACK_TIMEOUT,
        });
        Some(frame)
    }

    /// An ACK-classified frame arrived: release the gate and hand out the
    /// next head of queue.
    pub fn ack(&mut self, now: Instant) -> Option<Frame> {
        self.in_flight = None;
        self.next_to_send(now)
    }

    /// Take the in-flight frame whose ACK timer has expired, if any. The
    /// caller logs it; the queue then advances without retransmission.
    pub fn take_expired(&mut self, now: Instant) -> Option<Frame> {
        match &self.in_flight {
            Some(inflight) if inflight.deadline <= now => {
                let frame = inflight.frame;
                self.in_flight = None;
                Some(frame)
            }
            _ => None,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.as_ref().map(|f| f.deadline)
    }

    /// Drop everything, queued and in flight. Returns the number of frames
    /// discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len() + usize::from(self.in_flight.is_some());
        self.queue.clear();
        self.in_flight = None;
        dropped
    }
}
