//! duofern-core: Rademacher DuoFern transceiver protocol engine.
//!
//! Bridges a host automation platform to a fleet of DuoFern radio devices
//! (roller shutters, venetian blinds, gates, dimmers, switches, sensors,
//! thermostats, hand remotes) through the USB transceiver's fixed 22-byte
//! framed serial protocol.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: frames, identifiers, wire constants, command catalog
//! - **Transport**: serial link abstraction (serialport, mock)
//! - **Status**: table-driven status field extraction
//! - **Dispatch**: ACK-gated outbound queue
//! - **Registrar**: dynamic device registration
//! - **Events**: observer pattern for host decoupling
//! - **Session**: high-level orchestrator
//!
//! # Example
//!
//! ```no_run
//! use duofern_core::session::{DuofernSession, SessionConfig};
//!
//! let config = SessionConfig {
//!     port: "/dev/ttyUSB0".to_string(),
//!     code: "6FABCD".to_string(),
//!     ..Default::default()
//! };
//!
//! let mut session = DuofernSession::new(config).expect("invalid config");
//! session.run().expect("session failed");
//! ```

pub mod dispatch;
pub mod events;
pub mod protocol;
pub mod registrar;
pub mod session;
pub mod status;
pub mod transport;

// Re-exports for convenience
pub use dispatch::Dispatcher;
pub use events::{DuofernEvent, DuofernObserver, LogLevel, NullObserver, SessionState, TracingObserver};
pub use protocol::commands::Command;
pub use protocol::device::{DeviceClass, DeviceCode, DongleId, ProtocolError};
pub use protocol::frame::{Frame, FrameError, FrameKind};
pub use registrar::Registrar;
pub use session::{DuofernError, DuofernSession, SessionConfig};
pub use status::{FieldName, FieldValue, StatusFields};
pub use transport::{MockTransport, SerialStickTransport, StickTransport, TransportError};
