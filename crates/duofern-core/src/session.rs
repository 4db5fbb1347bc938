//! DuoFern session - high-level orchestrator for the protocol engine.
//!
//! The session owns the transport, the outbound queue, the pair set and the
//! registrar. Everything runs on one logical task: handshake steps, timer
//! expiry, command submission and inbound dispatch interleave only at the
//! explicit poll points.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::events::{DuofernEvent, DuofernObserver, LogLevel, SessionState, TracingObserver};
use crate::protocol::commands::{self, Command, DEFAULT_CHANNEL};
use crate::protocol::constants::{
    ACK_FRAME, HANDSHAKE_STEP_TIMEOUT, INIT_1, INIT_2, INIT_3, INIT_END,
};
use crate::protocol::device::{DeviceCode, DongleId, ProtocolError};
use crate::protocol::frame::{Frame, FrameKind};
use crate::registrar::Registrar;
use crate::status;
use crate::transport::{SerialStickTransport, StickTransport, TransportError};

#[derive(Error, Debug)]
pub enum DuofernError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("handshake step {step} received no frame within the step timeout")]
    HandshakeStepTimeout { step: &'static str },

    #[error("reopen failed: {0}")]
    ReopenFailed(#[source] Box<DuofernError>),

    #[error("registration of {codes:?} abandoned after repeated failed reopens")]
    RegistrationExhausted { codes: Vec<DeviceCode> },

    #[error("operation invalid in state {state}")]
    InvalidState { state: SessionState },

    #[error("session entered the failed state")]
    SessionFailed,
}

impl DuofernError {
    /// Stable kind tag for event consumers.
    pub fn kind(&self) -> &'static str {
        match self {
            DuofernError::ConfigInvalid(_) => "ConfigInvalid",
            DuofernError::Protocol(_) => "Protocol",
            DuofernError::Transport(TransportError::PortUnavailable { .. }) => "PortUnavailable",
            DuofernError::Transport(TransportError::PermissionDenied { .. }) => "PortPermission",
            DuofernError::Transport(_) => "PortIoError",
            DuofernError::HandshakeStepTimeout { .. } => "HandshakeStepTimeout",
            DuofernError::ReopenFailed(_) => "ReopenFailed",
            DuofernError::RegistrationExhausted { .. } => "RegistrationExhausted",
            DuofernError::InvalidState { .. } => "InvalidState",
            DuofernError::SessionFailed => "SessionFailed",
        }
    }
}

/// Configuration for a DuoFern session.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Serial port of the USB transceiver, e.g. `/dev/ttyUSB0`.
    pub port: String,
    /// Dongle id: `6F` followed by four hex digits.
    pub code: String,
    /// Device codes to announce during the handshake.
    #[serde(default)]
    pub devices: Vec<String>,
    /// Channel byte for device-addressed commands, `01` when unset.
    #[serde(default)]
    pub channel: Option<u8>,
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, DuofernError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DuofernError::ConfigInvalid(e.to_string()))?;
        toml::from_str(&content).map_err(|e| DuofernError::ConfigInvalid(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), DuofernError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| DuofernError::ConfigInvalid(e.to_string()))?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| DuofernError::ConfigInvalid(e.to_string()))
    }

    fn validate(&self) -> Result<(DongleId, Vec<DeviceCode>), DuofernError> {
        if self.port.is_empty() {
            return Err(DuofernError::ConfigInvalid("port is not set".to_string()));
        }
        let dongle: DongleId = self
            .code
            .parse()
            .map_err(|e: ProtocolError| DuofernError::ConfigInvalid(e.to_string()))?;
        let mut pairs = Vec::with_capacity(self.devices.len());
        for raw in &self.devices {
            let code: DeviceCode = raw
                .parse()
                .map_err(|e: ProtocolError| DuofernError::ConfigInvalid(e.to_string()))?;
            if code.is_broadcast() {
                return Err(DuofernError::ConfigInvalid(
                    "the broadcast code cannot be paired".to_string(),
                ));
            }
            if !pairs.contains(&code) {
                pairs.push(code);
            }
        }
        if pairs.len() > u8::MAX as usize {
            return Err(DuofernError::ConfigInvalid(format!(
                "too many devices: {}",
                pairs.len()
            )));
        }
        Ok((dongle, pairs))
    }
}

/// DuoFern session - drives the transceiver through handshake and steady
/// state.
pub struct DuofernSession<T: StickTransport, O: DuofernObserver> {
    transport: T,
    observer: Arc<O>,
    dongle: DongleId,
    channel: u8,
    pairs: Vec<DeviceCode>,
    state: SessionState,
    dispatcher: Dispatcher,
    registrar: Registrar,
}

impl DuofernSession<SerialStickTransport, TracingObserver> {
    /// Create a serial-backed session with the default tracing observer.
    pub fn new(config: SessionConfig) -> Result<Self, DuofernError> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: DuofernObserver> DuofernSession<SerialStickTransport, O> {
    /// Create a serial-backed session with a custom observer.
    pub fn with_observer(config: SessionConfig, observer: Arc<O>) -> Result<Self, DuofernError> {
        let transport = SerialStickTransport::new(&config.port);
        Self::with_transport(transport, config, observer)
    }
}

impl<T: StickTransport, O: DuofernObserver> DuofernSession<T, O> {
    /// Create a session over an arbitrary transport.
    pub fn with_transport(
        transport: T,
        config: SessionConfig,
        observer: Arc<O>,
    ) -> Result<Self, DuofernError> {
        let (dongle, pairs) = config.validate()?;
        Ok(Self {
            transport,
            observer,
            dongle,
            channel: config.channel.unwrap_or(DEFAULT_CHANNEL),
            pairs,
            state: SessionState::Closed,
            dispatcher: Dispatcher::new(),
            registrar: Registrar::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn dongle(&self) -> &DongleId {
        &self.dongle
    }

    /// Device codes announced in the current session, in announce order.
    pub fn pair_set(&self) -> &[DeviceCode] {
        &self.pairs
    }

    /// Open the transport and run the initialization handshake.
    pub fn start(&mut self) -> Result<(), DuofernError> {
        match self.state {
            SessionState::Closed | SessionState::Failed => {}
            state => return Err(DuofernError::InvalidState { state }),
        }
        self.set_state(SessionState::Opening);
        match self.open_and_handshake().and_then(|()| self.enter_ready()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.set_state(SessionState::Failed);
                self.emit_error(&e);
                Err(e)
            }
        }
    }

    /// Queue a pre-built frame. Frames are transmitted in submission order
    /// once the session is ready, each gated on its predecessor's ACK.
    pub fn submit(&mut self, frame: Frame) -> Result<(), DuofernError> {
        self.dispatcher.submit(frame);
        self.pump()
    }

    /// Build a catalog command for `device` and queue the resulting frames.
    pub fn send(&mut self, command: Command, device: DeviceCode) -> Result<(), DuofernError> {
        let frames = commands::build_with_channel(command, &self.dongle, &device, self.channel)?;
        for frame in frames {
            self.dispatcher.submit(frame);
        }
        self.pump()
    }

    /// Tear the link down and re-run the handshake announcing `new_pairs`.
    ///
    /// Queued and in-flight frames are dropped, not retried. On failure the
    /// previous pair set is restored and the session is left failed.
    pub fn reopen(&mut self, new_pairs: Vec<DeviceCode>) -> Result<(), DuofernError> {
        self.set_state(SessionState::Reinitializing);
        self.dispatcher.set_gate(false);
        let dropped = self.dispatcher.clear();
        if dropped > 0 {
            warn!(dropped, "discarding queued frames for reopen");
            self.log(
                LogLevel::Warn,
                format!("discarded {dropped} queued frames during reopen"),
            );
        }
        self.transport.close();
        self.transport.reset();

        let old_pairs = std::mem::replace(&mut self.pairs, sanitize_pairs(new_pairs));
        match self.open_and_handshake().and_then(|()| self.enter_ready()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.pairs = old_pairs;
                self.set_state(SessionState::Failed);
                let e = DuofernError::ReopenFailed(Box::new(e));
                self.emit_error(&e);
                Err(e)
            }
        }
    }

    /// Cancel all timers, drop the queue and close the transport.
    pub fn close(&mut self) {
        let dropped = self.dispatcher.clear();
        if dropped > 0 {
            warn!(dropped, "discarding queued frames on close");
        }
        self.dispatcher.set_gate(false);
        self.registrar.cancel();
        self.transport.close();
        self.set_state(SessionState::Closed);
        self.emit(DuofernEvent::Closed);
    }

    /// Drive the session: wait up to `max_wait` for inbound traffic, then
    /// service the ACK and registration timers.
    pub fn poll(&mut self, max_wait: Duration) -> Result<(), DuofernError> {
        let now = Instant::now();
        let mut timeout = max_wait;
        for deadline in [self.dispatcher.next_deadline(), self.registrar.next_deadline()]
            .into_iter()
            .flatten()
        {
            timeout = timeout.min(deadline.saturating_duration_since(now));
        }

        let inbound = if self.transport.is_open() {
            self.transport.poll_frame(timeout).map_err(DuofernError::from)
        } else {
            // Nothing can arrive while the port is closed; wait out the
            // nearest timer instead.
            if !timeout.is_zero() {
                std::thread::sleep(timeout);
            }
            Ok(None)
        };

        let result = match inbound {
            Ok(Some(frame)) => self.handle_frame(frame),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        match result.and_then(|()| self.tick(Instant::now())) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.set_state(SessionState::Failed);
                self.emit_error(&e);
                Err(e)
            }
        }
    }

    /// Run until the session is closed or fails without pending recovery.
    pub fn run(&mut self) -> Result<(), DuofernError> {
        if matches!(self.state, SessionState::Closed | SessionState::Failed) {
            self.start()?;
        }
        loop {
            match self.state {
                SessionState::Closed => return Ok(()),
                SessionState::Failed if self.registrar.next_deadline().is_none() => {
                    return Err(DuofernError::SessionFailed);
                }
                _ => self.poll(Duration::from_millis(200))?,
            }
        }
    }

    fn enter_ready(&mut self) -> Result<(), DuofernError> {
        self.set_state(SessionState::Ready);
        self.dispatcher.set_gate(true);
        self.emit(DuofernEvent::Initialized);
        self.pump()
    }

    fn open_and_handshake(&mut self) -> Result<(), DuofernError> {
        self.transport.open()?;
        self.emit(DuofernEvent::Opened);
        self.set_state(SessionState::Handshaking);
        self.handshake()
    }

    /// The fixed initialization sequence. Each step waits for any one
    /// inbound frame; the reply content is not validated.
    fn handshake(&mut self) -> Result<(), DuofernError> {
        info!(dongle = %self.dongle, pairs = self.pairs.len(), "starting handshake");
        self.step("init1", INIT_1, false)?;
        self.step("init2", INIT_2, false)?;
        self.step("set-dongle", commands::set_dongle(&self.dongle), true)?;
        self.step("init3", INIT_3, true)?;
        let pairs = self.pairs.clone();
        for (counter, device) in pairs.iter().enumerate() {
            self.step("set-pairs", commands::set_pairs(counter as u8, device), true)?;
        }
        self.step("init-end", INIT_END, true)?;
        self.step("status-request", commands::broadcast_status_request(), true)?;
        info!("handshake complete");
        Ok(())
    }

    fn step(
        &mut self,
        step: &'static str,
        frame: Frame,
        ack_after: bool,
    ) -> Result<(), DuofernError> {
        self.write(&frame)?;
        let reply = match self.transport.poll_frame(HANDSHAKE_STEP_TIMEOUT)? {
            Some(reply) => reply,
            None => return Err(DuofernError::HandshakeStepTimeout { step }),
        };
        self.emit(DuofernEvent::FrameRx { hex: reply.to_hex() });
        debug!(step, reply = %reply, "handshake step answered");
        if ack_after {
            self.write(&ACK_FRAME)?;
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<(), DuofernError> {
        self.emit(DuofernEvent::FrameRx { hex: frame.to_hex() });
        let now = Instant::now();
        match frame.kind() {
            FrameKind::Ack => {
                if let Some(next) = self.dispatcher.ack(now) {
                    self.write(&next)?;
                }
            }
            FrameKind::Paired(device) => {
                info!(device = %device, class = %device.class(), "pair notification");
                self.emit(DuofernEvent::Paired { device });
            }
            FrameKind::Unpaired(device) => {
                info!(device = %device, "unpair notification");
                self.emit(DuofernEvent::Unpaired { device });
            }
            FrameKind::Message => {
                // Auto-ACK goes on the wire before anything downstream
                // observes the message.
                self.write(&ACK_FRAME)?;
                self.emit(DuofernEvent::Message { frame });
                if frame.is_status() {
                    let device = frame.device_code();
                    let fields = status::parse(&frame);
                    self.emit(DuofernEvent::Status { device, fields });
                    self.registrar.observe(device, &self.pairs, now);
                }
            }
        }
        Ok(())
    }

    fn tick(&mut self, now: Instant) -> Result<(), DuofernError> {
        if let Some(stale) = self.dispatcher.take_expired(now) {
            warn!(frame = %stale, "no ACK within the queue timeout, advancing");
            self.log(
                LogLevel::Warn,
                format!("no ACK for frame {stale}, advancing without retransmission"),
            );
            self.pump()?;
        }
        if let Some(batch) = self.registrar.fire(now) {
            self.register_batch(batch, now);
        }
        Ok(())
    }

    /// Run the re-handshake that folds `batch` into the pair set. Failures
    /// are surfaced as events and retried by the registrar, so this never
    /// aborts the poll loop.
    fn register_batch(&mut self, batch: Vec<DeviceCode>, now: Instant) {
        match self.state {
            SessionState::Ready | SessionState::Failed => {}
            _ => {
                debug!("reopen in progress, deferring registration");
                self.registrar.defer(batch, now);
                return;
            }
        }
        let mut new_pairs = self.pairs.clone();
        for code in &batch {
            if !new_pairs.contains(code) {
                new_pairs.push(*code);
            }
        }
        info!(devices = ?batch, "registering newly observed devices");
        match self.reopen(new_pairs) {
            Ok(()) => self.registrar.succeeded(),
            Err(e) => {
                warn!(error = %e, "registration re-handshake failed");
                if let Some(codes) = self.registrar.failed(batch, Instant::now()) {
                    let e = DuofernError::RegistrationExhausted { codes };
                    error!(%e, "dropping registration batch");
                    self.emit_error(&e);
                }
            }
        }
    }

    fn pump(&mut self) -> Result<(), DuofernError> {
        if let Some(frame) = self.dispatcher.next_to_send(Instant::now()) {
            self.write(&frame)?;
        }
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), DuofernError> {
        self.transport.write_frame(frame)?;
        self.emit(DuofernEvent::FrameTx { hex: frame.to_hex() });
        Ok(())
    }

    fn set_state(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        debug!(from = %self.state, to = %to, "state transition");
        let from = std::mem::replace(&mut self.state, to);
        self.emit(DuofernEvent::StateChanged { from, to });
    }

    fn emit(&self, event: DuofernEvent) {
        self.observer.on_event(&event);
    }

    fn emit_error(&self, error: &DuofernError) {
        self.emit(DuofernEvent::Error {
            kind: error.kind(),
            detail: error.to_string(),
        });
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(DuofernEvent::Log {
            level,
            message: message.into(),
        });
    }
}

fn sanitize_pairs(pairs: Vec<DeviceCode>) -> Vec<DeviceCode> {
    let mut out = Vec::with_capacity(pairs.len());
    for code in pairs {
        if !code.is_broadcast() && !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DuofernEvent;
    use crate::protocol::constants::REGISTRATION_DEBOUNCE;
    use crate::status::{FieldName, FieldValue};
    use crate::transport::MockTransport;
    use std::sync::Mutex;

    const ACK_HEX: &str = "81000000000000000000000000000000000000000000";
    const STATUS_AA1111: &str = "0FFF0F210000000000000000000000AA111100000000";
    const STATUS_AA1111_POS50: &str = "0FFF0F210000000000000032000000AA111100000000";

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<DuofernEvent>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<DuofernEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DuofernObserver for RecordingObserver {
        fn on_event(&self, event: &DuofernEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn config(devices: &[&str]) -> SessionConfig {
        SessionConfig {
            port: "mock".to_string(),
            code: "6F1234".to_string(),
            devices: devices.iter().map(|s| s.to_string()).collect(),
            channel: None,
        }
    }

    #[allow(clippy::type_complexity)]
    fn session(
        devices: &[&str],
    ) -> (
        DuofernSession<MockTransport, RecordingObserver>,
        MockTransport,
        Arc<RecordingObserver>,
    ) {
        let mock = MockTransport::new();
        let observer = Arc::new(RecordingObserver::default());
        let session =
            DuofernSession::with_transport(mock.clone(), config(devices), observer.clone())
                .unwrap();
        (session, mock, observer)
    }

    // One reply per handshake step: init1, init2, set-dongle, init3, one
    // set-pairs per device, init-end, status-request.
    fn queue_handshake_replies(mock: &MockTransport, pair_count: usize) {
        for _ in 0..(6 + pair_count) {
            mock.queue_ack();
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(config(&[]).validate().is_ok());

        let mut bad = config(&[]);
        bad.code = "701234".to_string();
        assert!(matches!(bad.validate(), Err(DuofernError::ConfigInvalid(_))));

        let mut bad = config(&[]);
        bad.port.clear();
        assert!(matches!(bad.validate(), Err(DuofernError::ConfigInvalid(_))));

        assert!(matches!(
            config(&["FFFFFF"]).validate(),
            Err(DuofernError::ConfigInvalid(_))
        ));

        // Duplicates collapse, order is preserved.
        let (_, pairs) = config(&["AA1111", "AA2222", "AA1111"]).validate().unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].to_string(), "AA1111");
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = config(&["AA1111"]);
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: SessionConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.port, "mock");
        assert_eq!(parsed.code, "6F1234");
        assert_eq!(parsed.devices, vec!["AA1111".to_string()]);
        assert_eq!(parsed.channel, None);
    }

    #[test]
    fn test_handshake_sequence() {
        let (mut session, mock, _) = session(&["AA1111", "AA2222"]);
        queue_handshake_replies(&mock, 2);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        let writes = mock.writes_hex();
        let expected = [
            "01000000000000000000000000000000000000000000",
            "0E000000000000000000000000000000000000000000",
            "0A6F1234000100000000000000000000000000000000",
            ACK_HEX,
            "14140000000000000000000000000000000000000000",
            ACK_HEX,
            "0300AA11110000000000000000000000000000000000",
            ACK_HEX,
            "0301AA22220000000000000000000000000000000000",
            ACK_HEX,
            "10010000000000000000000000000000000000000000",
            ACK_HEX,
            "0DFF0F400000000000000000000000000000FFFFFF01",
            ACK_HEX,
        ];
        assert_eq!(writes, expected);
    }

    #[test]
    fn test_handshake_timeout_fails_session() {
        let (mut session, mock, _) = session(&[]);
        // Replies for init1 and init2 only; set-dongle starves.
        mock.queue_ack();
        mock.queue_ack();

        let err = session.start().unwrap_err();
        assert!(matches!(
            err,
            DuofernError::HandshakeStepTimeout { step: "set-dongle" }
        ));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_submissions_queue_until_ready() {
        let (mut session, mock, _) = session(&[]);
        let up = commands::build(Command::Up, session.dongle(), &"49ABCD".parse().unwrap())
            .unwrap()
            .remove(0);
        session.submit(up).unwrap();
        assert!(mock.writes().is_empty());

        queue_handshake_replies(&mock, 0);
        session.start().unwrap();

        // The queued command goes out right after the handshake.
        assert_eq!(mock.writes_hex().last().unwrap(), &up.to_hex());
    }

    #[test]
    fn test_ack_gating_orders_commands() {
        let (mut session, mock, _) = session(&[]);
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();
        mock.clear_writes();

        let dongle = *session.dongle();
        let target = "49ABCD".parse().unwrap();
        let f1 = commands::build(Command::Up, &dongle, &target).unwrap().remove(0);
        let f2 = commands::build(Command::Down, &dongle, &target).unwrap().remove(0);
        session.submit(f1).unwrap();
        session.submit(f2).unwrap();

        // Only the first frame is on the wire until its ACK arrives.
        assert_eq!(mock.writes_hex(), vec![f1.to_hex()]);

        mock.queue_ack();
        session.poll(Duration::ZERO).unwrap();
        assert_eq!(mock.writes_hex(), vec![f1.to_hex(), f2.to_hex()]);
    }

    #[test]
    fn test_message_is_auto_acked_before_dispatch() {
        let (mut session, mock, observer) = session(&[]);
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();
        mock.clear_writes();

        mock.queue_hex(STATUS_AA1111);
        session.poll(Duration::ZERO).unwrap();

        // The ACK is the first (and only) write triggered by the message.
        assert_eq!(mock.writes_hex(), vec![ACK_HEX.to_string()]);

        let events = observer.events();
        // The handshake wrote ACKs of its own; the auto-ACK is the last one.
        let ack_tx = events
            .iter()
            .rposition(|e| matches!(e, DuofernEvent::FrameTx { hex } if hex == ACK_HEX))
            .unwrap();
        let message = events
            .iter()
            .position(|e| matches!(e, DuofernEvent::Message { .. }))
            .unwrap();
        let status = events
            .iter()
            .position(|e| matches!(e, DuofernEvent::Status { .. }))
            .unwrap();
        assert!(ack_tx < message);
        assert!(message < status);
    }

    #[test]
    fn test_pair_events_not_auto_acked() {
        let (mut session, mock, observer) = session(&[]);
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();
        mock.clear_writes();

        mock.queue_hex("060200000000000000000000000000AA111100000000");
        session.poll(Duration::ZERO).unwrap();

        assert!(mock.writes().is_empty());
        assert!(observer.events().iter().any(
            |e| matches!(e, DuofernEvent::Paired { device } if device.to_string() == "AA1111")
        ));
    }

    #[test]
    fn test_status_report_decoded() {
        let (mut session, mock, observer) = session(&["AA1111"]);
        queue_handshake_replies(&mock, 1);
        session.start().unwrap();

        mock.queue_hex(STATUS_AA1111_POS50);
        session.poll(Duration::ZERO).unwrap();

        let events = observer.events();
        let (device, fields) = events
            .iter()
            .find_map(|e| match e {
                DuofernEvent::Status { device, fields } => Some((*device, fields.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(device.to_string(), "AA1111");
        assert_eq!(fields[&FieldName::Position], FieldValue::Number(50));
        assert_eq!(fields[&FieldName::Moving], FieldValue::Text("stop"));
    }

    #[test]
    fn test_registrar_triggers_reopen_with_extended_pairs() {
        let (mut session, mock, _) = session(&[]);
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();
        mock.clear_writes();

        mock.queue_hex(STATUS_AA1111);
        session.poll(Duration::ZERO).unwrap();
        assert!(session.pair_set().is_empty());

        // Wait out the debounce, then serve the re-handshake. The first
        // queued ACK is consumed as a normal inbound frame before the
        // debounce timer is serviced.
        std::thread::sleep(REGISTRATION_DEBOUNCE + Duration::from_millis(50));
        mock.queue_ack();
        queue_handshake_replies(&mock, 1);
        session.poll(Duration::ZERO).unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.pair_set().len(), 1);
        assert_eq!(session.pair_set()[0].to_string(), "AA1111");
        assert!(mock
            .writes_hex()
            .contains(&"0300AA11110000000000000000000000000000000000".to_string()));
    }

    #[test]
    fn test_duplicate_status_coalesces_into_one_reopen() {
        let (mut session, mock, _) = session(&[]);
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();

        for _ in 0..3 {
            mock.queue_hex(STATUS_AA1111);
            session.poll(Duration::ZERO).unwrap();
        }

        std::thread::sleep(REGISTRATION_DEBOUNCE + Duration::from_millis(50));
        mock.clear_writes();
        mock.queue_ack();
        queue_handshake_replies(&mock, 1);
        session.poll(Duration::ZERO).unwrap();

        let set_pairs_writes: Vec<_> = mock
            .writes_hex()
            .into_iter()
            .filter(|hex| hex.starts_with("03"))
            .collect();
        assert_eq!(
            set_pairs_writes,
            vec!["0300AA11110000000000000000000000000000000000".to_string()]
        );
        assert_eq!(session.pair_set().len(), 1);
    }

    #[test]
    fn test_reopen_failure_restores_old_pairs() {
        let (mut session, mock, _) = session(&["AA1111"]);
        queue_handshake_replies(&mock, 1);
        session.start().unwrap();

        // No replies queued: the reopen handshake starves at init1.
        let err = session
            .reopen(vec!["AA1111".parse().unwrap(), "AA2222".parse().unwrap()])
            .unwrap_err();
        assert!(matches!(err, DuofernError::ReopenFailed(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.pair_set().len(), 1);
        assert_eq!(session.pair_set()[0].to_string(), "AA1111");
    }

    #[test]
    fn test_reopen_discards_queued_frames() {
        let (mut session, mock, observer) = session(&[]);
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();

        let dongle = *session.dongle();
        let target = "49ABCD".parse().unwrap();
        let f1 = commands::build(Command::Up, &dongle, &target).unwrap().remove(0);
        let f2 = commands::build(Command::Down, &dongle, &target).unwrap().remove(0);
        session.submit(f1).unwrap();
        session.submit(f2).unwrap();
        mock.clear_writes();

        queue_handshake_replies(&mock, 1);
        session.reopen(vec!["AA1111".parse().unwrap()]).unwrap();

        // Neither the in-flight nor the queued frame survives the reopen.
        assert!(!mock.writes_hex().contains(&f1.to_hex()));
        assert!(!mock.writes_hex().contains(&f2.to_hex()));
        assert!(observer.events().iter().any(|e| matches!(
            e,
            DuofernEvent::Log {
                level: LogLevel::Warn,
                ..
            }
        )));
    }

    #[test]
    fn test_close_emits_and_resets() {
        let (mut session, mock, observer) = session(&[]);
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(observer
            .events()
            .iter()
            .any(|e| matches!(e, DuofernEvent::Closed)));

        // A closed session can be started again.
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_start_twice_rejected() {
        let (mut session, mock, _) = session(&[]);
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(DuofernError::InvalidState {
                state: SessionState::Ready
            })
        ));
    }

    #[test]
    fn test_remote_pair_submits_both_frames() {
        let (mut session, mock, _) = session(&[]);
        queue_handshake_replies(&mock, 0);
        session.start().unwrap();
        mock.clear_writes();

        session
            .send(Command::RemotePair, "74ABCD".parse().unwrap())
            .unwrap();
        // First frame out immediately, second gated on the ACK.
        assert_eq!(mock.writes().len(), 1);
        mock.queue_ack();
        session.poll(Duration::ZERO).unwrap();

        let writes = mock.writes_hex();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].ends_with("00"));
        assert!(writes[1].ends_with("01"));
        assert_eq!(&writes[0][..42], &writes[1][..42]);
    }
}
