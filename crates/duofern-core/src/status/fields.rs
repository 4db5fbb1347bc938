//! Declarative status field table.
//!
//! Status decoding is pure data: each format byte selects an ordered list
//! of field ids, and each id resolves to one bit-extraction rule (byte
//! position relative to the format byte, bit window, optional inversion
//! base, optional value map). Keeping the table out of the parsing code
//! leaves the parser a single loop.

use std::collections::BTreeMap;
use std::fmt;

/// Closed set of status field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldName {
    Moving,
    Position,
    SunAutomatic,
    TimeAutomatic,
    DawnAutomatic,
    DuskAutomatic,
    ManualMode,
    VentilatingMode,
    RunningTime,
    WindAutomatic,
    WindMode,
    RainAutomatic,
    RainMode,
    SunPosition,
    SunMode,
    TiltInSunPos,
    TiltInVentPos,
    TiltAfterMoveLevel,
    TiltAfterStopDown,
    TiltAfterStopUp,
    Reversal,
    BlindsMode,
    VentilatingPosition,
    MotorDeadTime,
    SlatRunTime,
    DefaultSlatPos,
    DefaultDrivingDirection,
    TenMinuteAlarm,
    TwoKCycleAlarm,
    FreezeProtection,
    SmokeProtection,
    ExternalContact,
    QuickClose,
    LocalOperation,
    SlatPosition,
    Blocked,
    LostSensor,
    Obstacle,
    Block,
    AutomaticClosing,
    OpenSpeed,
    BackJump,
    LightCurtain,
    LightingTime,
    ReversalTime,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Moving => "moving",
            FieldName::Position => "position",
            FieldName::SunAutomatic => "sunAutomatic",
            FieldName::TimeAutomatic => "timeAutomatic",
            FieldName::DawnAutomatic => "dawnAutomatic",
            FieldName::DuskAutomatic => "duskAutomatic",
            FieldName::ManualMode => "manualMode",
            FieldName::VentilatingMode => "ventilatingMode",
            FieldName::RunningTime => "runningTime",
            FieldName::WindAutomatic => "windAutomatic",
            FieldName::WindMode => "windMode",
            FieldName::RainAutomatic => "rainAutomatic",
            FieldName::RainMode => "rainMode",
            FieldName::SunPosition => "sunPosition",
            FieldName::SunMode => "sunMode",
            FieldName::TiltInSunPos => "tiltInSunPos",
            FieldName::TiltInVentPos => "tiltInVentPos",
            FieldName::TiltAfterMoveLevel => "tiltAfterMoveLevel",
            FieldName::TiltAfterStopDown => "tiltAfterStopDown",
            FieldName::TiltAfterStopUp => "tiltAfterStopUp",
            FieldName::Reversal => "reversal",
            FieldName::BlindsMode => "blindsMode",
            FieldName::VentilatingPosition => "ventilatingPosition",
            FieldName::MotorDeadTime => "motorDeadTime",
            FieldName::SlatRunTime => "slatRunTime",
            FieldName::DefaultSlatPos => "defaultSlatPos",
            FieldName::DefaultDrivingDirection => "defaultDrivingDirection",
            FieldName::TenMinuteAlarm => "10minuteAlarm",
            FieldName::TwoKCycleAlarm => "2000cycleAlarm",
            FieldName::FreezeProtection => "freezeProtection",
            FieldName::SmokeProtection => "smokeProtection",
            FieldName::ExternalContact => "externalContact",
            FieldName::QuickClose => "quickClose",
            FieldName::LocalOperation => "localOperation",
            FieldName::SlatPosition => "slatPosition",
            FieldName::Blocked => "blocked",
            FieldName::LostSensor => "lostSensor",
            FieldName::Obstacle => "obstacle",
            FieldName::Block => "block",
            FieldName::AutomaticClosing => "automaticClosing",
            FieldName::OpenSpeed => "openSpeed",
            FieldName::BackJump => "backJump",
            FieldName::LightCurtain => "lightCurtain",
            FieldName::LightingTime => "lightingTime",
            FieldName::ReversalTime => "reversalTime",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A decoded field value: either a mapped label or a raw number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Text(&'static str),
    Number(u16),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Decoded status report: field name to value.
pub type StatusFields = BTreeMap<FieldName, FieldValue>;

// ============================================================================
// Value maps
// ============================================================================

pub const ON_OFF: &[&str] = &["off", "on"];
pub const UP_DOWN: &[&str] = &["up", "down"];
/// Both bit values report "stop": motion direction is tracked by the host
/// from issued commands, not from device-reported status.
pub const MOVING: &[&str] = &["stop", "stop"];
pub const MOTOR: &[&str] = &["off", "short(160ms)", "long(480ms)", "individual"];
pub const CLOSE_T: &[&str] = &["off", "30", "60", "90", "120", "150", "180", "210", "240"];
pub const OPEN_S: &[&str] = &["error", "11", "15", "19"];

// ============================================================================
// Field definitions
// ============================================================================

/// One bit-extraction rule.
///
/// `pos` is the byte offset of the 16-bit big-endian extraction window,
/// counted from the format byte. `pos` 0 therefore overlaps the format byte
/// itself; some status bits are embedded there.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub id: u16,
    pub name: FieldName,
    pub pos: usize,
    pub bit_from: u8,
    pub bit_to: u8,
    pub invert: Option<u16>,
    pub map: Option<&'static [&'static str]>,
}

const fn def(
    id: u16,
    name: FieldName,
    pos: usize,
    bit_from: u8,
    bit_to: u8,
    invert: Option<u16>,
    map: Option<&'static [&'static str]>,
) -> FieldDef {
    FieldDef { id, name, pos, bit_from, bit_to, invert, map }
}

pub const FIELD_DEFS: &[FieldDef] = &[
    def(50, FieldName::Moving, 0, 0, 0, None, Some(MOVING)),
    def(100, FieldName::SunAutomatic, 0, 2, 2, None, Some(ON_OFF)),
    def(101, FieldName::TimeAutomatic, 0, 3, 3, None, Some(ON_OFF)),
    def(102, FieldName::Position, 7, 0, 6, Some(100), None),
    def(104, FieldName::DawnAutomatic, 0, 4, 4, None, Some(ON_OFF)),
    def(105, FieldName::DuskAutomatic, 0, 5, 5, None, Some(ON_OFF)),
    def(106, FieldName::ManualMode, 0, 7, 7, None, Some(ON_OFF)),
    def(107, FieldName::VentilatingMode, 1, 4, 4, None, Some(ON_OFF)),
    def(109, FieldName::RunningTime, 6, 0, 7, None, None),
    def(111, FieldName::WindAutomatic, 1, 0, 0, None, Some(ON_OFF)),
    def(112, FieldName::WindMode, 1, 1, 1, None, Some(ON_OFF)),
    def(113, FieldName::RainAutomatic, 1, 2, 2, None, Some(ON_OFF)),
    def(114, FieldName::RainMode, 1, 3, 3, None, Some(ON_OFF)),
    def(115, FieldName::SunPosition, 8, 0, 6, Some(100), None),
    def(116, FieldName::SunMode, 1, 5, 5, None, Some(ON_OFF)),
    def(117, FieldName::TiltInSunPos, 1, 6, 6, None, Some(ON_OFF)),
    def(118, FieldName::TiltInVentPos, 1, 7, 7, None, Some(ON_OFF)),
    def(119, FieldName::TiltAfterMoveLevel, 2, 0, 0, None, Some(ON_OFF)),
    def(120, FieldName::TiltAfterStopDown, 2, 1, 1, None, Some(ON_OFF)),
    def(121, FieldName::Reversal, 2, 2, 2, None, Some(ON_OFF)),
    def(122, FieldName::BlindsMode, 2, 3, 3, None, Some(ON_OFF)),
    def(123, FieldName::VentilatingPosition, 10, 0, 6, Some(100), None),
    def(124, FieldName::MotorDeadTime, 2, 4, 5, None, Some(MOTOR)),
    def(125, FieldName::SlatRunTime, 5, 0, 7, None, None),
    def(126, FieldName::DefaultSlatPos, 4, 0, 6, None, None),
    def(127, FieldName::DefaultDrivingDirection, 2, 6, 6, None, Some(UP_DOWN)),
    def(128, FieldName::TenMinuteAlarm, 3, 0, 0, None, Some(ON_OFF)),
    def(129, FieldName::TwoKCycleAlarm, 3, 1, 1, None, Some(ON_OFF)),
    def(130, FieldName::FreezeProtection, 3, 2, 2, None, Some(ON_OFF)),
    def(131, FieldName::SmokeProtection, 3, 3, 3, None, Some(ON_OFF)),
    def(132, FieldName::ExternalContact, 3, 4, 4, None, Some(ON_OFF)),
    def(133, FieldName::QuickClose, 3, 5, 5, None, Some(ON_OFF)),
    def(134, FieldName::LocalOperation, 3, 7, 7, None, Some(ON_OFF)),
    def(135, FieldName::SlatPosition, 9, 0, 6, None, None),
    def(136, FieldName::TiltAfterStopUp, 2, 7, 7, None, Some(ON_OFF)),
    def(140, FieldName::Blocked, 10, 7, 7, None, Some(ON_OFF)),
    def(141, FieldName::LostSensor, 0, 1, 1, None, Some(ON_OFF)),
    def(400, FieldName::Obstacle, 6, 0, 0, None, Some(ON_OFF)),
    def(402, FieldName::Block, 6, 1, 1, None, Some(ON_OFF)),
    def(404, FieldName::TenMinuteAlarm, 1, 5, 5, None, Some(ON_OFF)),
    def(405, FieldName::AutomaticClosing, 1, 0, 3, None, Some(CLOSE_T)),
    def(406, FieldName::OpenSpeed, 1, 6, 7, None, Some(OPEN_S)),
    def(407, FieldName::BackJump, 2, 0, 0, None, Some(ON_OFF)),
    def(408, FieldName::TwoKCycleAlarm, 2, 1, 1, None, Some(ON_OFF)),
    def(409, FieldName::LightCurtain, 2, 2, 2, None, Some(ON_OFF)),
    def(410, FieldName::LightingTime, 5, 0, 7, None, None),
    def(411, FieldName::ReversalTime, 4, 0, 3, None, None),
];

pub fn field_def(id: u16) -> Option<&'static FieldDef> {
    FIELD_DEFS.iter().find(|d| d.id == id)
}

// ============================================================================
// Format tables
// ============================================================================

const FORMAT_21: &[u16] = &[100, 101, 102, 104, 105, 106, 111, 112, 113, 114, 50];

const FORMAT_22: &[u16] = &[100, 101, 102, 104, 105, 106, 50];

const FORMAT_23: &[u16] = &[
    102, 107, 109, 115, 116, 117, 118, 119, 120, 121, 122, 123, 124, 125, 126, 127, 128, 129,
    130, 131, 132, 133, 134, 135, 136, 140, 141, 50,
];

const FORMAT_23A: &[u16] = &[
    102, 107, 109, 115, 116, 117, 118, 119, 120, 121, 122, 123, 124, 125, 126, 127, 133, 140,
    141, 50,
];

const FORMAT_24: &[u16] = &[
    102, 107, 115, 116, 117, 118, 119, 120, 121, 122, 123, 124, 125, 126, 127, 140, 141, 400,
    402, 50,
];

const FORMAT_24A: &[u16] = &[
    102, 107, 115, 123, 124, 400, 402, 404, 405, 406, 407, 408, 409, 410, 411, 50,
];

/// Ordered field id list for a format key.
///
/// The keys `23a` and `24a` are synthetic sub-format markers carried over
/// from the protocol documentation. Dispatch happens on the raw format byte
/// rendered as two uppercase hex characters, so these entries are never
/// selected at runtime. They are kept as data nonetheless.
pub fn format_ids(key: &str) -> Option<&'static [u16]> {
    match key {
        "21" => Some(FORMAT_21),
        "22" => Some(FORMAT_22),
        "23" => Some(FORMAT_23),
        "23a" => Some(FORMAT_23A),
        "24" => Some(FORMAT_24),
        "24a" => Some(FORMAT_24A),
        _ => None,
    }
}
