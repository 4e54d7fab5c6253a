//! avrlib-transport: socket transports for avrlib.
//!
//! Provides [`TcpTransport`] (the persistent command connection to a
//! receiver, implementing the [`Transport`](avrlib_core::Transport) trait)
//! and [`UdpTransport`] (datagram socket used for broadcast discovery).

pub mod tcp;
pub mod udp;

pub use tcp::TcpTransport;
pub use udp::UdpTransport;
