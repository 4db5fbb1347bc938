//! Dynamic device registration.
//!
//! The transceiver ACKs frames from devices it has not been told about, but
//! silently drops commands addressed to them. When a status frame arrives
//! from an unknown code the registrar coalesces it with a debounce window
//! and asks the session for one re-handshake covering the whole batch.

use std::time::Instant;

use tracing::debug;

use crate::protocol::constants::{REGISTRATION_DEBOUNCE, REGISTRATION_MAX_ATTEMPTS};
use crate::protocol::device::DeviceCode;

/// Coalesces newly observed device codes into re-handshake batches.
#[derive(Debug, Default)]
pub struct Registrar {
    pending: Vec<DeviceCode>,
    deadline: Option<Instant>,
    failures: u32,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a status-originating device code.
    ///
    /// Codes already in the pair set are ignored. A new or already-pending
    /// code restarts the debounce window, so a burst of status messages
    /// coalesces into one re-handshake.
    pub fn observe(&mut self, code: DeviceCode, pair_set: &[DeviceCode], now: Instant) {
        if code.is_broadcast() || pair_set.contains(&code) {
            return;
        }
        if !self.pending.contains(&code) {
            debug!(device = %code, class = %code.class(), "unknown device observed");
            self.pending.push(code);
        }
        self.deadline = Some(now + REGISTRATION_DEBOUNCE);
    }

    /// Pending codes in order of first observation.
    pub fn pending(&self) -> &[DeviceCode] {
        &self.pending
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Hand out the batch once the debounce window has elapsed.
    pub fn fire(&mut self, now: Instant) -> Option<Vec<DeviceCode>> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(std::mem::take(&mut self.pending))
            }
            _ => None,
        }
    }

    /// The session could not run the re-handshake right now; retry after a
    /// fresh debounce window.
    pub fn defer(&mut self, batch: Vec<DeviceCode>, now: Instant) {
        self.requeue(batch);
        self.deadline = Some(now + REGISTRATION_DEBOUNCE);
    }

    /// The re-handshake carrying the batch succeeded.
    pub fn succeeded(&mut self) {
        self.failures = 0;
    }

    /// The re-handshake failed. Requeues the batch with exponential backoff
    /// (2 s, 4 s); the third consecutive failure abandons it instead, and
    /// the abandoned codes are returned. Abandoned devices stay eligible
    /// for discovery the next time they transmit status.
    pub fn failed(&mut self, batch: Vec<DeviceCode>, now: Instant) -> Option<Vec<DeviceCode>> {
        self.failures += 1;
        if self.failures >= REGISTRATION_MAX_ATTEMPTS {
            self.failures = 0;
            if self.pending.is_empty() {
                self.deadline = None;
            }
            return Some(batch);
        }
        let backoff = REGISTRATION_DEBOUNCE * 2u32.pow(self.failures - 1);
        self.requeue(batch);
        self.deadline = Some(now + backoff);
        None
    }

    /// Drop all pending state and disarm the timer.
    pub fn cancel(&mut self) {
        self.pending.clear();
        self.deadline = None;
        self.failures = 0;
    }

    fn requeue(&mut self, batch: Vec<DeviceCode>) {
        let mut merged = batch;
        for code in self.pending.drain(..) {
            if !merged.contains(&code) {
                merged.push(code);
            }
        }
        self.pending = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn code(s: &str) -> DeviceCode {
        s.parse().unwrap()
    }

    #[test]
    fn test_burst_coalesces_into_one_batch() {
        // Devices AA1111, AA2222, AA1111 observed at t=0, t+0.5s, t+1.0s:
        // one batch, ordered by first observation, due at t+3.0s.
        let mut r = Registrar::new();
        let t0 = Instant::now();
        let pair_set = [];

        r.observe(code("AA1111"), &pair_set, t0);
        r.observe(code("AA2222"), &pair_set, t0 + Duration::from_millis(500));
        r.observe(code("AA1111"), &pair_set, t0 + Duration::from_millis(1000));

        assert_eq!(r.pending(), &[code("AA1111"), code("AA2222")]);
        let due = t0 + Duration::from_millis(1000) + REGISTRATION_DEBOUNCE;
        assert_eq!(r.next_deadline(), Some(due));

        assert_eq!(r.fire(due - Duration::from_millis(1)), None);
        let batch = r.fire(due).unwrap();
        assert_eq!(batch, vec![code("AA1111"), code("AA2222")]);
        assert!(r.pending().is_empty());
        assert_eq!(r.next_deadline(), None);
        assert_eq!(r.fire(due + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_known_devices_ignored() {
        let mut r = Registrar::new();
        let now = Instant::now();
        let pair_set = [code("AA1111")];

        r.observe(code("AA1111"), &pair_set, now);
        r.observe(DeviceCode::BROADCAST, &[], now);
        assert!(r.pending().is_empty());
        assert_eq!(r.next_deadline(), None);
    }

    #[test]
    fn test_failure_backs_off_then_abandons() {
        let mut r = Registrar::new();
        let t0 = Instant::now();
        r.observe(code("AA1111"), &[], t0);

        let due = t0 + REGISTRATION_DEBOUNCE;
        let batch = r.fire(due).unwrap();

        // First failure: retry in 2s.
        assert_eq!(r.failed(batch, due), None);
        assert_eq!(r.next_deadline(), Some(due + Duration::from_secs(2)));
        let retry1 = due + Duration::from_secs(2);
        let batch = r.fire(retry1).unwrap();

        // Second failure: retry in 4s.
        assert_eq!(r.failed(batch, retry1), None);
        assert_eq!(r.next_deadline(), Some(retry1 + Duration::from_secs(4)));
        let retry2 = retry1 + Duration::from_secs(4);
        let batch = r.fire(retry2).unwrap();

        // Third failure: the batch is dropped.
        let abandoned = r.failed(batch, retry2).unwrap();
        assert_eq!(abandoned, vec![code("AA1111")]);
        assert!(r.pending().is_empty());
        assert_eq!(r.next_deadline(), None);

        // The device is rediscovered on its next status transmission.
        r.observe(code("AA1111"), &[], retry2);
        assert_eq!(r.pending(), &[code("AA1111")]);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut r = Registrar::new();
        let t0 = Instant::now();
        r.observe(code("AA1111"), &[], t0);
        let batch = r.fire(t0 + REGISTRATION_DEBOUNCE).unwrap();
        assert_eq!(r.failed(batch, t0), None);

        let batch = r.fire(t0 + Duration::from_secs(10)).unwrap();
        r.succeeded();

        // A later failure starts the backoff ladder from the bottom.
        assert_eq!(r.failed(batch, t0), None);
        assert_eq!(r.next_deadline(), Some(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn test_defer_requeues_in_front() {
        let mut r = Registrar::new();
        let t0 = Instant::now();
        r.observe(code("AA1111"), &[], t0);
        let batch = r.fire(t0 + REGISTRATION_DEBOUNCE).unwrap();

        // A code observed while the re-handshake was pending stays behind
        // the deferred batch.
        r.observe(code("AA2222"), &[], t0);
        r.defer(batch, t0);
        assert_eq!(r.pending(), &[code("AA1111"), code("AA2222")]);
    }

    #[test]
    fn test_cancel() {
        let mut r = Registrar::new();
        let now = Instant::now();
        r.observe(code("AA1111"), &[], now);
        r.cancel();
        assert!(r.pending().is_empty());
        assert_eq!(r.next_deadline(), None);
    }
}
