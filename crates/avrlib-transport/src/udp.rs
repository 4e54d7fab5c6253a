//! UDP transport for broadcast discovery.
//!
//! This module provides [`UdpTransport`], a datagram socket wrapper used by
//! the discovery client. Unlike [`super::TcpTransport`] it does **not**
//! implement the [`Transport`](avrlib_core::Transport) trait: UDP is
//! connectionless and datagram-based rather than stream-oriented.
//!
//! # Example
//!
//! ```no_run
//! use avrlib_transport::UdpTransport;
//! use std::time::Duration;
//!
//! # async fn example() -> avrlib_core::Result<()> {
//! let transport = UdpTransport::bind("0.0.0.0:0").await?;
//! transport.set_broadcast(true)?;
//!
//! let broadcast_addr = "255.255.255.255:60128".parse().unwrap();
//! transport.send_to(b"...framed discovery request...", broadcast_addr).await?;
//!
//! let mut buf = [0u8; 1024];
//! let (n, src) = transport.recv_from(&mut buf, Duration::from_secs(1)).await?;
//! println!("Received {} bytes from {}", n, src);
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;

use avrlib_core::error::{Error, Result};

/// UDP transport for datagram-based device communication.
///
/// Wraps a [`tokio::net::UdpSocket`] with error mapping consistent with the
/// rest of the avrlib transport layer.
#[derive(Debug)]
pub struct UdpTransport {
    /// The underlying UDP socket.
    socket: UdpSocket,
    /// The local address the socket is bound to.
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to a local address.
    ///
    /// Use `"0.0.0.0:0"` for any available port, or a fixed port like
    /// `"0.0.0.0:60128"` for the well-known protocol port. A bind failure
    /// (port already in use) is fatal to the caller.
    pub async fn bind(addr: &str) -> Result<Self> {
        tracing::debug!(addr = %addr, "Binding UDP socket");

        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            tracing::error!(addr = %addr, error = %e, "Failed to bind UDP socket");
            Error::Transport(format!("failed to bind UDP socket on {}: {}", addr, e))
        })?;

        let local_addr = socket.local_addr().map_err(Error::Io)?;
        tracing::debug!(local_addr = %local_addr, "UDP socket bound");

        Ok(Self { socket, local_addr })
    }

    /// Bind to a specific port on all interfaces.
    ///
    /// Convenience method equivalent to `bind(&format!("0.0.0.0:{port}"))`.
    pub async fn bind_port(port: u16) -> Result<Self> {
        Self::bind(&format!("0.0.0.0:{}", port)).await
    }

    /// The local address this socket is bound to.
    ///
    /// Useful when binding to port 0 to discover the assigned port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a datagram to the specified address.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        tracing::trace!(
            local = %self.local_addr,
            remote = %addr,
            bytes = data.len(),
            "Sending datagram"
        );

        self.socket.send_to(data, addr).await.map_err(|e| {
            tracing::error!(local = %self.local_addr, remote = %addr, error = %e, "Failed to send datagram");
            Error::Io(e)
        })?;

        Ok(())
    }

    /// Receive a datagram with timeout. Returns `(bytes_read, source_addr)`.
    ///
    /// The buffer should be large enough to hold an entire datagram; excess
    /// bytes are silently discarded (standard UDP behavior). eISCP discovery
    /// announcements fit comfortably in 1024 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no datagram arrives within `timeout`.
    pub async fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> Result<(usize, SocketAddr)> {
        match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(Ok((n, src))) => {
                tracing::trace!(local = %self.local_addr, remote = %src, bytes = n, "Received datagram");
                Ok((n, src))
            }
            Ok(Err(e)) => {
                tracing::error!(local = %self.local_addr, error = %e, "Failed to receive datagram");
                Err(Error::Io(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Enable or disable broadcast on this socket.
    ///
    /// Must be enabled before sending to broadcast addresses
    /// (e.g. `255.255.255.255` or a subnet broadcast like `192.168.0.255`).
    pub fn set_broadcast(&self, enable: bool) -> Result<()> {
        tracing::debug!(local = %self.local_addr, enable = enable, "Setting broadcast");

        self.socket.set_broadcast(enable).map_err(|e| {
            tracing::error!(local = %self.local_addr, error = %e, "Failed to set broadcast");
            Error::Io(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_and_local_addr() {
        let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr();

        assert_eq!(addr.ip(), std::net::Ipv4Addr::LOCALHOST);
        assert_ne!(addr.port(), 0, "OS should assign a nonzero port");
    }

    #[tokio::test]
    async fn bind_port_in_use_fails() {
        let first = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr();

        let result = UdpTransport::bind(&addr.to_string()).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn send_recv_loopback() {
        let sender = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let receiver = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        let data = b"!xECNQSTN\r";
        sender.send_to(data, receiver.local_addr()).await.unwrap();

        let mut buf = [0u8; 256];
        let (n, src) = receiver
            .recv_from(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(&buf[..n], data);
        assert_eq!(src, sender.local_addr(), "source should be the sender");
    }

    #[tokio::test]
    async fn recv_timeout() {
        let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        let mut buf = [0u8; 256];
        let result = transport.recv_from(&mut buf, Duration::from_millis(50)).await;

        assert!(
            matches!(result, Err(Error::Timeout)),
            "expected Timeout, got: {:?}",
            result
        );
    }

    #[tokio::test]
    async fn broadcast_flag() {
        // Broadcast datagrams are not reliably delivered on loopback in CI
        // environments; the important part is that the flag takes effect
        // without errors.
        let sender = UdpTransport::bind("0.0.0.0:0").await.unwrap();
        sender.set_broadcast(true).unwrap();
        sender.set_broadcast(false).unwrap();
    }

    #[tokio::test]
    async fn multiple_datagrams_in_order() {
        let sender = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let receiver = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let dest = receiver.local_addr();

        let messages: &[&[u8]] = &[b"first", b"second", b"third"];
        for msg in messages {
            sender.send_to(msg, dest).await.unwrap();
        }

        // Small delay to let all datagrams arrive.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut buf = [0u8; 256];
        for expected in messages {
            let (n, _) = receiver
                .recv_from(&mut buf, Duration::from_secs(2))
                .await
                .unwrap();
            assert_eq!(&buf[..n], *expected);
        }
    }
}
