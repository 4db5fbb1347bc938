//! Protocol module - DuoFern wire protocol definitions.

pub mod commands;
pub mod constants;
pub mod device;
pub mod frame;

pub use commands::Command;
pub use device::{DeviceClass, DeviceCode, DongleId, ProtocolError};
pub use frame::{Frame, FrameError, FrameKind, Framer, FRAME_HEX_LEN, FRAME_LEN};
