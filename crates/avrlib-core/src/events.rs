//! Asynchronous device event types.
//!
//! Events are emitted by a device session through a `tokio::sync::broadcast`
//! channel. Receivers push status changes unsolicited (front-panel volume
//! knob, remote control, another network client), so subscribing is the only
//! way to observe the full state of the unit without polling.

use crate::types::PropertyValue;

/// An event emitted by a device session.
///
/// Events are delivered on a best-effort basis through a bounded broadcast
/// channel; slow consumers may miss events under heavy load.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A receiver property changed, solicited or not.
    Property {
        /// 3-character ISCP group code (e.g. `"PWR"`, `"MVL"`).
        group: String,
        /// The decoded value.
        value: PropertyValue,
    },

    /// An inbound message carried a group with no registered decoder.
    ///
    /// Informational only; the session keeps running.
    Unrecognized {
        /// The full message text, group code included.
        payload: String,
    },

    /// A known group's parameter failed to decode.
    ///
    /// Informational only; the session keeps running.
    DecodeFailed {
        /// 3-character ISCP group code.
        group: String,
        /// The parameter text that failed to decode.
        parameter: String,
    },

    /// Successfully connected to the receiver.
    Connected,

    /// Connection to the receiver was closed or lost.
    Disconnected,
}
