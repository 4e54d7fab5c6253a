//! # avrlib -- Network Control for eISCP AV Receivers
//!
//! `avrlib` is an asynchronous Rust library for controlling Onkyo/Integra
//! family AV receivers over the LAN. It speaks eISCP: ASCII commands in a
//! length-framed binary envelope over a persistent TCP connection, with a
//! UDP broadcast handshake for finding devices.
//!
//! ## Quick Start
//!
//! Add `avrlib` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! avrlib = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Find a receiver and turn it on:
//!
//! ```no_run
//! use avrlib::eiscp::{Discovery, DiscoveryOptions, EiscpClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut discovery = Discovery::bind(DiscoveryOptions::default()).await?;
//!     let device = discovery.discover_first().await?;
//!     println!("found {}", device);
//!
//!     let client = EiscpClient::from_detected(&device);
//!     client.power_on().await?;
//!     client.set_source("FM").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                 | Purpose                                         |
//! |-----------------------|-------------------------------------------------|
//! | `avrlib-core`         | [`Transport`] trait, [`DeviceEvent`], [`PropertyValue`], errors |
//! | `avrlib-transport`    | TCP and UDP socket transports                   |
//! | `avrlib-eiscp`        | Protocol driver: framing, correlation, discovery |
//! | `avrlib-test-harness` | Mock transport and scripted mock receiver       |
//! | **`avrlib`**          | This facade crate -- re-exports everything      |
//!
//! ## Events
//!
//! Receivers push status changes unsolicited -- a volume knob turn reaches
//! every network client. Subscribe to observe them without polling:
//!
//! ```no_run
//! use avrlib::{DeviceEvent, eiscp::EiscpClient};
//! # async fn example(client: &EiscpClient) -> avrlib::Result<()> {
//! let mut events = client.subscribe();
//! loop {
//!     match events.recv().await {
//!         Ok(DeviceEvent::Property { group, value }) => {
//!             println!("{group} changed to {value}");
//!         }
//!         Ok(event) => println!("{event:?}"),
//!         Err(_) => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Command correlation
//!
//! eISCP responses carry no request id; a command is answered by the next
//! status message in the same 3-character group. [`eiscp::EiscpClient`]
//! keeps one response waiter per group, resolves it with the matching
//! status message, and times out after four seconds. Commands issued while
//! the session is down connect on demand.

pub use avrlib_core::*;

/// eISCP protocol driver.
///
/// Provides [`EiscpClient`](eiscp::EiscpClient) for the command session and
/// [`Discovery`](eiscp::Discovery) for finding receivers on the LAN, plus
/// the frame codec and the injectable command/decoder tables.
pub mod eiscp {
    pub use avrlib_eiscp::*;
}

/// Socket transports.
///
/// Provides [`TcpTransport`](transport::TcpTransport) and
/// [`UdpTransport`](transport::UdpTransport). Most applications never use
/// these directly; the eISCP driver manages its own sockets.
pub mod transport {
    pub use avrlib_transport::*;
}
