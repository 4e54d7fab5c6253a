//! avrlib-core: Core traits, types, and error definitions for avrlib.
//!
//! This crate defines the protocol-agnostic abstractions shared by the
//! avrlib transport and driver crates. Home automation frontends and other
//! applications depend on these types without pulling in any network code.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`DeviceEvent`] -- asynchronous receiver state change notifications
//! - [`PropertyValue`] -- decoded value of a receiver property
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use avrlib_core::*`.
pub use error::{Error, Result};
pub use events::DeviceEvent;
pub use transport::Transport;
pub use types::PropertyValue;
