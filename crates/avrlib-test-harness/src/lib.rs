//! avrlib-test-harness: test utilities for avrlib.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the protocol engine without a real receiver, and [`MockReceiver`], a
//! scripted TCP device that speaks the wire format from the device side.
//!
//! The harness deliberately implements the device half of the framing on
//! its own instead of reusing the library codec: a mock that frames its
//! replies with the code under test would not catch codec regressions.

pub mod mock_receiver;
pub mod mock_transport;

pub use mock_receiver::MockReceiver;
pub use mock_transport::{MockHandle, MockTransport};
