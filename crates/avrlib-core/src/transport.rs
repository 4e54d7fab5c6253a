//! Transport trait for device communication.
//!
//! The [`Transport`] trait abstracts over the byte stream to an AV receiver.
//! The eISCP protocol engine operates on a `Transport` rather than directly
//! on a TCP socket, enabling both real device control and deterministic unit
//! testing with `MockTransport` from the `avrlib-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a device.
///
/// Implementations handle connection state and error mapping at the socket
/// layer. Framing and message semantics are handled by the protocol engine
/// that consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the device.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying transport.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the device into the provided buffer.
    ///
    /// Returns the number of bytes actually read, which may be any nonzero
    /// amount up to `buf.len()` -- the stream layer reassembles frames from
    /// arbitrary fragments. Waits up to `timeout` for data; returns
    /// [`Error::Timeout`](crate::error::Error::Timeout) if none arrives.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After `close()`, subsequent `send()` and `receive()` calls should
    /// return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
