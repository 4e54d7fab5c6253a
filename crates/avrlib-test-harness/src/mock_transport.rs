//! Scripted in-memory transport for protocol-engine tests.
//!
//! [`MockTransport`] implements the [`Transport`] trait over two in-memory
//! queues. The paired [`MockHandle`] stays with the test and can inject
//! inbound chunks (including fragments and garbage), inspect everything the
//! engine sent, and simulate a dropped connection -- all while the engine
//! owns the transport.
//!
//! # Example
//!
//! ```
//! use avrlib_test_harness::MockTransport;
//!
//! let mock = MockTransport::new();
//! let handle = mock.handle();
//! // Hand `mock` to the code under test, then:
//! handle.push_inbound(b"...device bytes...");
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use avrlib_core::error::{Error, Result};
use avrlib_core::transport::Transport;

#[derive(Default)]
struct Inner {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    closed: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    notify: Notify,
}

/// A scripted [`Transport`] backed by in-memory queues.
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// Test-side handle to a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Create a mock transport in the connected state.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                notify: Notify::new(),
            }),
        }
    }

    /// The test-side handle for this transport.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// Queue bytes for the next `receive()` call.
    ///
    /// Each push is delivered as one read, so chunk boundaries are under
    /// test control: push a frame in two halves to exercise reassembly.
    pub fn push_inbound(&self, bytes: &[u8]) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.inbound.push_back(bytes.to_vec());
        drop(inner);
        self.shared.notify.notify_one();
    }

    /// Everything sent through the transport so far, one entry per
    /// `send()` call.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.shared.inner.lock().unwrap().sent.clone()
    }

    /// Simulate the peer dropping the connection: queued data is still
    /// delivered, then `receive()` and `send()` fail with
    /// [`Error::ConnectionLost`].
    pub fn drop_connection(&self) {
        self.shared.inner.lock().unwrap().closed = true;
        self.shared.notify.notify_one();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.closed {
            return Err(Error::ConnectionLost);
        }
        inner.sent.push(data.to_vec());
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut inner = self.shared.inner.lock().unwrap();
                if let Some(mut chunk) = inner.inbound.pop_front() {
                    if chunk.len() > buf.len() {
                        // Deliver what fits; the rest stays queued.
                        let rest = chunk.split_off(buf.len());
                        inner.inbound.push_front(rest);
                    }
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    return Ok(chunk.len());
                }
                if inner.closed {
                    return Err(Error::ConnectionLost);
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            tokio::select! {
                _ = self.shared.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return Err(Error::Timeout),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.inner.lock().unwrap().closed = true;
        self.shared.notify.notify_one();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.shared.inner.lock().unwrap().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_pushed_chunks_in_order() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();

        handle.push_inbound(b"first");
        handle.push_inbound(b"second");

        let mut buf = [0u8; 64];
        let n = mock.receive(&mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&buf[..n], b"first");
        let n = mock.receive(&mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&buf[..n], b"second");
    }

    #[tokio::test]
    async fn receive_waits_for_later_push() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();

        let pusher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.push_inbound(b"late");
        });

        let mut buf = [0u8; 64];
        let n = mock.receive(&mut buf, Duration::from_secs(2)).await.unwrap();
        assert_eq!(&buf[..n], b"late");
        pusher.await.unwrap();
    }

    #[tokio::test]
    async fn receive_times_out_when_idle() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];
        let result = mock.receive(&mut buf, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn oversized_chunk_spans_reads() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();
        handle.push_inbound(b"0123456789");

        let mut buf = [0u8; 4];
        let n = mock.receive(&mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&buf[..n], b"0123");
        let n = mock.receive(&mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&buf[..n], b"4567");
        let n = mock.receive(&mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&buf[..n], b"89");
    }

    #[tokio::test]
    async fn records_sent_data() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();

        mock.send(b"one").await.unwrap();
        mock.send(b"two").await.unwrap();

        assert_eq!(handle.sent(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn drop_connection_fails_io() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();
        handle.push_inbound(b"pending");
        handle.drop_connection();

        // Queued data drains first, then the loss surfaces.
        let mut buf = [0u8; 64];
        let n = mock.receive(&mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&buf[..n], b"pending");

        let result = mock.receive(&mut buf, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::ConnectionLost)));
        let result = mock.send(b"x").await;
        assert!(matches!(result, Err(Error::ConnectionLost)));
        assert!(!mock.is_connected());
    }
}
