//! Typed event stream for host decoupling.
//!
//! Hosts (automation platforms, CLIs, test harnesses) subscribe to session
//! events without coupling to the engine internals. Consumers match
//! exhaustively on [`DuofernEvent`].

use std::fmt;

use crate::protocol::device::DeviceCode;
use crate::protocol::frame::Frame;
use crate::status::StatusFields;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Observable session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Handshaking,
    Ready,
    Reinitializing,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Closed => write!(f, "closed"),
            SessionState::Opening => write!(f, "opening"),
            SessionState::Handshaking => write!(f, "handshaking"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Reinitializing => write!(f, "reinitializing"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Events emitted by the protocol engine.
#[derive(Debug, Clone)]
pub enum DuofernEvent {
    /// Serial port opened.
    Opened,
    /// Handshake completed, session is ready.
    Initialized,
    /// Session closed.
    Closed,
    /// Lifecycle state changed.
    StateChanged { from: SessionState, to: SessionState },
    /// Frame written to the wire (trace only).
    FrameTx { hex: String },
    /// Frame received from the wire (trace only).
    FrameRx { hex: String },
    /// Pairing notification from the transceiver.
    Paired { device: DeviceCode },
    /// Unpairing notification from the transceiver.
    Unpaired { device: DeviceCode },
    /// Device-originated message, already auto-ACKed.
    Message { frame: Frame },
    /// Decoded device status report.
    Status { device: DeviceCode, fields: StatusFields },
    /// Log message.
    Log { level: LogLevel, message: String },
    /// Error surfaced to the host.
    Error { kind: &'static str, detail: String },
}

/// Observer trait for receiving engine events.
///
/// Implement this in your host layer to receive updates.
pub trait DuofernObserver: Send + Sync {
    fn on_event(&self, event: &DuofernEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl DuofernObserver for NullObserver {
    fn on_event(&self, _event: &DuofernEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl DuofernObserver for TracingObserver {
    fn on_event(&self, event: &DuofernEvent) {
        match event {
            DuofernEvent::Opened => tracing::info!("port opened"),
            DuofernEvent::Initialized => tracing::info!("session initialized"),
            DuofernEvent::Closed => tracing::info!("session closed"),
            DuofernEvent::StateChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "state changed");
            }
            DuofernEvent::FrameTx { hex } => tracing::trace!(frame = %hex, "TX"),
            DuofernEvent::FrameRx { hex } => tracing::trace!(frame = %hex, "RX"),
            DuofernEvent::Paired { device } => {
                tracing::info!(device = %device, class = %device.class(), "paired");
            }
            DuofernEvent::Unpaired { device } => {
                tracing::info!(device = %device, "unpaired");
            }
            DuofernEvent::Message { frame } => {
                tracing::debug!(frame = %frame, "device message");
            }
            DuofernEvent::Status { device, fields } => {
                tracing::debug!(device = %device, count = fields.len(), "status report");
            }
            DuofernEvent::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            DuofernEvent::Error { kind, detail } => {
                tracing::error!(kind = %kind, "{}", detail);
            }
        }
    }
}
