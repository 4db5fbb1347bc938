//! Outbound frame construction.
//!
//! All device-directed commands share a fixed 22-byte layout:
//!
//! ```text
//! hex offset: 0  2    4         12                 30      36      42
//!             0D <CH> <CMD(8)>  <18 hex zeros>     <DONG>  <DEV>   <SFX>
//! ```
//!
//! `CH` is the channel (`01` by default, `FF` for status requests), `CMD`
//! is a four-byte body from the command catalog, `DONG` the dongle id
//! (`000000` for status requests), `DEV` the target device code or
//! `FFFFFF` for broadcast, and `SFX` the suffix byte (`01` for status
//! requests).

use super::device::{DeviceCode, DongleId, ProtocolError};
use super::frame::{Frame, FRAME_LEN};

/// Default channel byte for device-addressed commands.
pub const DEFAULT_CHANNEL: u8 = 0x01;

/// Channel byte used by status requests.
pub const STATUS_CHANNEL: u8 = 0xFF;

/// The catalog of device-directed commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
    Stop,
    Toggle,
    /// Target position in percent, 0..=100.
    Position(u8),
    /// Target slat position in percent, 0..=100.
    SlatPosition(u8),
    StatusRequest,
    SunMode(bool),
    WindMode(bool),
    RainMode(bool),
    SunAutomatic(bool),
    TimeAutomatic(bool),
    DawnAutomatic(bool),
    DuskAutomatic(bool),
    ManualMode(bool),
    WindAutomatic(bool),
    RainAutomatic(bool),
    SunPosition(u8),
    VentilatingPosition(u8),
    VentilatingMode(bool),
    /// Pairing handshake towards a hand remote, sent as two frames.
    RemotePair,
    /// Unpairing handshake towards a hand remote, sent as two frames.
    RemoteUnpair,
}

fn percent(value: u8) -> Result<u8, ProtocolError> {
    if value > 100 {
        return Err(ProtocolError::PositionOutOfRange(value));
    }
    Ok(value)
}

fn automatic(sub: u8, on: bool) -> [u8; 4] {
    [0x08, sub, 0x00, if on { 0xFD } else { 0xFE }]
}

impl Command {
    fn body(&self) -> Result<[u8; 4], ProtocolError> {
        let body = match *self {
            Command::Up => [0x07, 0x01, 0x00, 0x00],
            Command::Down => [0x07, 0x03, 0x00, 0x00],
            Command::Stop => [0x07, 0x02, 0x00, 0x00],
            Command::Toggle => [0x07, 0x1A, 0x00, 0x00],
            Command::Position(n) => [0x07, 0x07, 0x00, percent(n)?],
            Command::SlatPosition(n) => [0x07, 0x1B, 0x00, percent(n)?],
            Command::StatusRequest => [0x0F, 0x40, 0x00, 0x00],
            Command::SunMode(true) => [0x07, 0x08, 0x01, 0xFF],
            Command::SunMode(false) => [0x07, 0x0A, 0x01, 0x00],
            Command::WindMode(true) => [0x07, 0x0D, 0x01, 0xFF],
            Command::WindMode(false) => [0x07, 0x0E, 0x01, 0x00],
            Command::RainMode(true) => [0x07, 0x11, 0x01, 0xFF],
            Command::RainMode(false) => [0x07, 0x12, 0x01, 0x00],
            Command::SunAutomatic(on) => automatic(0x03, on),
            Command::TimeAutomatic(on) => automatic(0x04, on),
            Command::DawnAutomatic(on) => automatic(0x05, on),
            Command::DuskAutomatic(on) => automatic(0x06, on),
            Command::ManualMode(on) => automatic(0x07, on),
            Command::WindAutomatic(on) => automatic(0x08, on),
            Command::RainAutomatic(on) => automatic(0x09, on),
            Command::SunPosition(n) => [0x08, 0x01, 0x00, percent(n)?],
            Command::VentilatingPosition(n) => [0x08, 0x02, 0x00, percent(n)?],
            Command::VentilatingMode(on) => [0x08, 0x02, 0x00, if on { 0xFD } else { 0xFE }],
            Command::RemotePair => [0x06, 0x01, 0x00, 0x00],
            Command::RemoteUnpair => [0x06, 0x02, 0x00, 0x00],
        };
        Ok(body)
    }

    fn is_remote_handshake(&self) -> bool {
        matches!(self, Command::RemotePair | Command::RemoteUnpair)
    }
}

fn assemble(channel: u8, body: [u8; 4], dongle: Option<&DongleId>, device: &DeviceCode, suffix: u8) -> Frame {
    let mut bytes = [0u8; FRAME_LEN];
    bytes[0] = 0x0D;
    bytes[1] = channel;
    bytes[2..6].copy_from_slice(&body);
    if let Some(dongle) = dongle {
        bytes[15..18].copy_from_slice(&dongle.bytes());
    }
    bytes[18..21].copy_from_slice(&device.bytes());
    bytes[21] = suffix;
    Frame::from_array(bytes)
}

/// Build the frames for `command` on the default channel.
pub fn build(command: Command, dongle: &DongleId, device: &DeviceCode) -> Result<Vec<Frame>, ProtocolError> {
    build_with_channel(command, dongle, device, DEFAULT_CHANNEL)
}

/// Build the frames for `command`, overriding the channel byte.
///
/// Most commands produce a single frame. The remote pair and unpair
/// handshakes produce two frames differing only in the suffix byte, both of
/// which must be submitted back-to-back. Status requests force channel
/// `FF`, a zeroed dongle field and suffix `01`.
pub fn build_with_channel(
    command: Command,
    dongle: &DongleId,
    device: &DeviceCode,
    channel: u8,
) -> Result<Vec<Frame>, ProtocolError> {
    let body = command.body()?;
    if command == Command::StatusRequest {
        return Ok(vec![assemble(STATUS_CHANNEL, body, None, device, 0x01)]);
    }
    if command.is_remote_handshake() {
        return Ok(vec![
            assemble(channel, body, Some(dongle), device, 0x00),
            assemble(channel, body, Some(dongle), device, 0x01),
        ]);
    }
    Ok(vec![assemble(channel, body, Some(dongle), device, 0x00)])
}

/// Broadcast status request closing the handshake.
pub fn broadcast_status_request() -> Frame {
    let body = [0x0F, 0x40, 0x00, 0x00];
    assemble(STATUS_CHANNEL, body, None, &DeviceCode::BROADCAST, 0x01)
}

/// Handshake step three: register the dongle id with the transceiver.
pub fn set_dongle(dongle: &DongleId) -> Frame {
    let mut bytes = [0u8; FRAME_LEN];
    bytes[0] = 0x0A;
    bytes[1..4].copy_from_slice(&dongle.bytes());
    bytes[4] = 0x00;
    bytes[5] = 0x01;
    Frame::from_array(bytes)
}

/// Handshake step five: announce one paired device at queue index `counter`.
pub fn set_pairs(counter: u8, device: &DeviceCode) -> Frame {
    let mut bytes = [0u8; FRAME_LEN];
    bytes[0] = 0x03;
    bytes[1] = counter;
    bytes[2..5].copy_from_slice(&device.bytes());
    Frame::from_array(bytes)
}
