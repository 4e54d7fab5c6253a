//! Last-known receiver state, cached per status group.
//!
//! The receiver pushes status changes continuously (volume knob, remote
//! control, other network clients), so the session keeps the last decoded
//! value per group and answers state queries with zero latency. Updated by
//! the dispatcher on every successful decode, solicited or not; entries are
//! overwritten per group and never cleared.

use std::collections::HashMap;

use avrlib_core::types::PropertyValue;

/// Cached receiver state, keyed by 3-character group code.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    properties: HashMap<String, PropertyValue>,
}

impl DeviceState {
    /// The last decoded value for a group, if any has been seen.
    pub fn get(&self, group: &str) -> Option<&PropertyValue> {
        self.properties.get(group)
    }

    /// Number of groups with a cached value.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether no status message has been decoded yet.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Main-zone power state (`PWR`), if known.
    pub fn power(&self) -> Option<bool> {
        self.get("PWR")?.as_switch()
    }

    /// Main-zone mute state (`AMT`), if known.
    pub fn muted(&self) -> Option<bool> {
        self.get("AMT")?.as_switch()
    }

    /// Master volume level (`MVL`), if known.
    pub fn master_volume(&self) -> Option<u8> {
        self.get("MVL")?.as_level()
    }

    /// Main-zone input selector code (`SLI`), if known.
    pub fn source(&self) -> Option<&str> {
        self.get("SLI")?.as_selector()
    }

    pub(crate) fn update(&mut self, group: &str, value: PropertyValue) {
        self.properties.insert(group.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let state = DeviceState::default();
        assert!(state.is_empty());
        assert_eq!(state.power(), None);
        assert_eq!(state.master_volume(), None);
    }

    #[test]
    fn update_and_query() {
        let mut state = DeviceState::default();
        state.update("PWR", PropertyValue::Switch(true));
        state.update("MVL", PropertyValue::Level(0x2A));
        state.update("AMT", PropertyValue::Switch(false));
        state.update("SLI", PropertyValue::Selector("24".into()));

        assert_eq!(state.len(), 4);
        assert_eq!(state.power(), Some(true));
        assert_eq!(state.master_volume(), Some(0x2A));
        assert_eq!(state.muted(), Some(false));
        assert_eq!(state.source(), Some("24"));
    }

    #[test]
    fn update_overwrites_per_group() {
        let mut state = DeviceState::default();
        state.update("MVL", PropertyValue::Level(10));
        state.update("MVL", PropertyValue::Level(11));
        assert_eq!(state.master_volume(), Some(11));
        assert_eq!(state.len(), 1);
    }
}
