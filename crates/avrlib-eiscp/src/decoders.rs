//! Per-group parameter decoders.
//!
//! Each status group has exactly one canonical decoder that turns its ASCII
//! parameter into a [`PropertyValue`]. The table is injected into the
//! session at construction; [`DecoderTable::receiver_defaults`] covers the
//! common main-zone and multi-zone groups.
//!
//! A missing decoder and a failing decoder are different conditions: the
//! first makes a message *unrecognized*, the second is a *decode error* on
//! a known group. Both are surfaced as non-fatal events by the dispatcher.

use std::collections::HashMap;

use avrlib_core::error::{Error, Result};
use avrlib_core::types::PropertyValue;

/// A group parameter decoder.
pub type DecodeFn = fn(&str) -> Result<PropertyValue>;

/// Immutable table mapping a 3-character group code to its decoder.
#[derive(Debug, Clone, Default)]
pub struct DecoderTable {
    decoders: HashMap<String, DecodeFn>,
}

impl DecoderTable {
    /// An empty decoder table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoders for the standard receiver groups:
    ///
    /// - power and mute (`PWR`, `AMT`, `ZPW`, `ZMT`, `PW3`, `MT3`) as
    ///   on/off switches,
    /// - volume (`MVL`, `ZVL`, `VL3`) as hex-coded levels,
    /// - input selection (`SLI`, `SLZ`, `SL3`) as selector codes.
    pub fn receiver_defaults() -> Self {
        let mut table = Self::new();
        for group in ["PWR", "AMT", "ZPW", "ZMT", "PW3", "MT3"] {
            table.register(group, decode_switch);
        }
        for group in ["MVL", "ZVL", "VL3"] {
            table.register(group, decode_level);
        }
        for group in ["SLI", "SLZ", "SL3"] {
            table.register(group, decode_selector);
        }
        table
    }

    /// Add or replace the decoder for a group.
    pub fn register(&mut self, group: &str, decode: DecodeFn) {
        self.decoders.insert(group.to_string(), decode);
    }

    /// Decode a parameter for the given group.
    ///
    /// `None` if the group has no registered decoder; `Some(Err(_))` if the
    /// decoder rejected the parameter.
    pub fn decode(&self, group: &str, parameter: &str) -> Option<Result<PropertyValue>> {
        let decode = self.decoders.get(group)?;
        Some(decode(parameter))
    }

    /// Whether a decoder is registered for the group.
    pub fn knows(&self, group: &str) -> bool {
        self.decoders.contains_key(group)
    }
}

/// Decode a two-digit binary parameter (`"00"` / `"01"`) as an on/off state.
pub fn decode_switch(parameter: &str) -> Result<PropertyValue> {
    match parameter {
        "00" => Ok(PropertyValue::Switch(false)),
        "01" => Ok(PropertyValue::Switch(true)),
        other => Err(Error::InvalidParameter(format!(
            "switch parameter not 00/01: {other:?}"
        ))),
    }
}

/// Decode a two-digit hexadecimal parameter as a 0-255 level.
pub fn decode_level(parameter: &str) -> Result<PropertyValue> {
    if parameter.len() != 2 || !parameter.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidParameter(format!(
            "level parameter not two hex digits: {parameter:?}"
        )));
    }
    let level = u8::from_str_radix(parameter, 16)
        .map_err(|_| Error::InvalidParameter(format!("level parameter: {parameter:?}")))?;
    Ok(PropertyValue::Level(level))
}

/// Decode a two-character selector code (input source position).
pub fn decode_selector(parameter: &str) -> Result<PropertyValue> {
    if parameter.len() != 2 || !parameter.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(Error::InvalidParameter(format!(
            "selector parameter not a two-character code: {parameter:?}"
        )));
    }
    Ok(PropertyValue::Selector(parameter.to_string()))
}
