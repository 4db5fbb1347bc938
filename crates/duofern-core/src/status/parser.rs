//! Status frame decoding.
//!
//! A status report begins `0F FF 0F <format>`. The format byte keys the
//! field table; every listed field is a 16-bit big-endian window at hex
//! offset `6 + 2 * pos`, masked to its bit range, optionally inverted and
//! optionally mapped to a label.

use super::fields::{self, FieldValue, StatusFields};
use crate::protocol::frame::Frame;

/// Decode a status frame into its field map.
///
/// Non-status frames and unknown format bytes yield an empty map. Fields
/// absent from the format's id list are not emitted.
pub fn parse(frame: &Frame) -> StatusFields {
    let mut out = StatusFields::new();
    if !frame.is_status() {
        return out;
    }
    let hex = frame.to_hex();
    let format_key = &hex[6..8];
    let ids = match fields::format_ids(format_key) {
        Some(ids) => ids,
        None => return out,
    };
    for &id in ids {
        let def = match fields::field_def(id) {
            Some(def) => def,
            None => continue,
        };
        let start = 6 + 2 * def.pos;
        let window = match hex.get(start..start + 4) {
            Some(window) => window,
            None => continue,
        };
        let raw = match u16::from_str_radix(window, 16) {
            Ok(raw) => raw,
            Err(_) => continue,
        };
        let width = def.bit_to - def.bit_from + 1;
        let mask = if width >= 16 { u16::MAX } else { (1u16 << width) - 1 };
        let mut value = (raw >> def.bit_from) & mask;
        if let Some(base) = def.invert {
            value = base.saturating_sub(value);
        }
        let decoded = match def.map {
            Some(map) => match map.get(value as usize) {
                Some(label) => FieldValue::Text(label),
                // Out-of-range values pass through as raw numbers.
                None => FieldValue::Number(value),
            },
            None => FieldValue::Number(value),
        };
        out.insert(def.name, decoded);
    }
    out
}
