//! Core types used throughout avrlib.
//!
//! ISCP is a stringly-typed protocol: every status message is a 3-character
//! group code followed by an ASCII parameter. [`PropertyValue`] is the
//! decoded, typed form of such a parameter.

use std::fmt;

/// A decoded receiver property value.
///
/// Produced by the per-group decoders and cached in the device state map.
/// The variant depends on the group: power and mute groups decode to
/// [`Switch`](PropertyValue::Switch), volume groups to
/// [`Level`](PropertyValue::Level), input selection to
/// [`Selector`](PropertyValue::Selector). Groups with free-form parameters
/// decode to [`Text`](PropertyValue::Text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// An on/off state (power, mute, speaker A/B).
    Switch(bool),
    /// A numeric level, 0-255 (master volume, zone volume).
    Level(u8),
    /// A two-character selector code (input source, e.g. `"24"` for FM).
    Selector(String),
    /// An uninterpreted ASCII parameter.
    Text(String),
}

impl PropertyValue {
    /// The boolean state, if this value is a [`Switch`](PropertyValue::Switch).
    pub fn as_switch(&self) -> Option<bool> {
        match self {
            PropertyValue::Switch(on) => Some(*on),
            _ => None,
        }
    }

    /// The numeric level, if this value is a [`Level`](PropertyValue::Level).
    pub fn as_level(&self) -> Option<u8> {
        match self {
            PropertyValue::Level(level) => Some(*level),
            _ => None,
        }
    }

    /// The selector code, if this value is a [`Selector`](PropertyValue::Selector).
    pub fn as_selector(&self) -> Option<&str> {
        match self {
            PropertyValue::Selector(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Switch(true) => write!(f, "on"),
            PropertyValue::Switch(false) => write!(f, "off"),
            PropertyValue::Level(level) => write!(f, "{level}"),
            PropertyValue::Selector(code) => write!(f, "selector {code}"),
            PropertyValue::Text(text) => write!(f, "{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_accessors() {
        assert_eq!(PropertyValue::Switch(true).as_switch(), Some(true));
        assert_eq!(PropertyValue::Switch(false).as_switch(), Some(false));
        assert_eq!(PropertyValue::Level(10).as_switch(), None);
    }

    #[test]
    fn level_accessors() {
        assert_eq!(PropertyValue::Level(0x42).as_level(), Some(0x42));
        assert_eq!(PropertyValue::Switch(true).as_level(), None);
    }

    #[test]
    fn selector_accessors() {
        let v = PropertyValue::Selector("24".into());
        assert_eq!(v.as_selector(), Some("24"));
        assert_eq!(PropertyValue::Level(1).as_selector(), None);
    }

    #[test]
    fn display() {
        assert_eq!(PropertyValue::Switch(true).to_string(), "on");
        assert_eq!(PropertyValue::Switch(false).to_string(), "off");
        assert_eq!(PropertyValue::Level(33).to_string(), "33");
        assert_eq!(PropertyValue::Selector("02".into()).to_string(), "selector 02");
        assert_eq!(PropertyValue::Text("HDMI 3".into()).to_string(), "HDMI 3");
    }
}
