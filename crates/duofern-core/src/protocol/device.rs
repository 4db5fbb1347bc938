//! Device and transceiver identifiers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid dongle id {0:?}, expected 6F followed by four hex digits")]
    InvalidDongleId(String),

    #[error("invalid device code {0:?}, expected six hex digits")]
    InvalidDeviceCode(String),

    #[error("position {0} out of range 0..=100")]
    PositionOutOfRange(u8),
}

fn parse_hex3(s: &str) -> Option<[u8; 3]> {
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut bytes = [0u8; 3];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16).ok()?;
    }
    Some(bytes)
}

/// Radio address of a paired device, six hex characters on the wire.
///
/// The leading byte classifies the device type, see [`DeviceClass`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceCode([u8; 3]);

impl DeviceCode {
    /// Reserved broadcast address.
    pub const BROADCAST: DeviceCode = DeviceCode([0xFF, 0xFF, 0xFF]);

    pub const fn from_array(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Device class encoded in the leading byte.
    pub fn class(&self) -> DeviceClass {
        DeviceClass::from_leading_byte(self.0[0])
    }
}

impl FromStr for DeviceCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex3(s)
            .map(Self)
            .ok_or_else(|| ProtocolError::InvalidDeviceCode(s.to_string()))
    }
}

impl fmt::Display for DeviceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl fmt::Debug for DeviceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceCode({self})")
    }
}

/// Identity of the USB transceiver, six hex characters with a fixed `6F`
/// leading byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DongleId([u8; 3]);

impl DongleId {
    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }
}

impl FromStr for DongleId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_hex3(s) {
            Some(bytes) if bytes[0] == 0x6F => Ok(Self(bytes)),
            _ => Err(ProtocolError::InvalidDongleId(s.to_string())),
        }
    }
}

impl fmt::Display for DongleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl fmt::Debug for DongleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DongleId({self})")
    }
}

/// Device type classification by the leading code byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    RollerShutter,
    VenetianBlind,
    Gate,
    Actuator,
    Dimmer,
    Sensor,
    Thermostat,
    Remote,
    Unknown,
}

impl DeviceClass {
    pub fn from_leading_byte(byte: u8) -> Self {
        match byte {
            0x40 | 0x41 | 0x47 | 0x49 | 0x61 | 0x62 => Self::RollerShutter,
            0x42 | 0x4B | 0x4C | 0x70 => Self::VenetianBlind,
            0x4E => Self::Gate,
            0x43 | 0x46 | 0x71 => Self::Actuator,
            0x48 | 0x4A => Self::Dimmer,
            0x65 | 0x69 | 0xA5 | 0xA9 | 0xAA | 0xAB | 0xAC | 0xAF => Self::Sensor,
            0x73 | 0xE1 => Self::Thermostat,
            0x74 | 0xA0..=0xA4 | 0xA7 | 0xA8 | 0xAD | 0xE0 => Self::Remote,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceClass::RollerShutter => "roller shutter",
            DeviceClass::VenetianBlind => "venetian blind",
            DeviceClass::Gate => "gate",
            DeviceClass::Actuator => "actuator",
            DeviceClass::Dimmer => "dimmer",
            DeviceClass::Sensor => "sensor",
            DeviceClass::Thermostat => "thermostat",
            DeviceClass::Remote => "remote",
            DeviceClass::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}
