//! LAN discovery via UDP broadcast.
//!
//! Receivers answer a broadcast `ECNQSTN` query with an `ECN` payload
//! describing themselves:
//!
//! ```text
//! ECNTX-NR809/60128/XX/0009B04530D1
//! ```
//!
//! i.e. model, ISCP port, area code, and a unique identifier, joined by
//! slashes. [`Discovery`] broadcasts the query, collects and deduplicates
//! announcements, and retries until a device answers or its deadline
//! passes.
//!
//! # Usage
//!
//! ```no_run
//! use avrlib_eiscp::discovery::{Discovery, DiscoveryOptions};
//!
//! # async fn example() -> avrlib_core::Result<()> {
//! let mut discovery = Discovery::bind(DiscoveryOptions::default()).await?;
//! let device = discovery.discover_first().await?;
//! println!("{} at {}:{}", device.model, device.address, device.iscp_port);
//! # Ok(())
//! # }
//! ```

use std::cmp;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use tokio::sync::broadcast;

use avrlib_core::error::{Error, Result};
use avrlib_transport::UdpTransport;

use crate::client::DEFAULT_PORT;
use crate::commands;
use crate::frame;

/// Offset of the model name within the announcement's first field.
const MODEL_OFFSET: usize = 6;

/// Length of the stable device identifier.
const IDENTIFIER_LEN: usize = 12;

/// Broadcast channel capacity for detection subscribers.
const DETECTED_CHANNEL_CAPACITY: usize = 16;

/// Options for configuring LAN discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Address the discovery request is broadcast to.
    pub broadcast_address: String,
    /// Destination port for the broadcast (the well-known protocol port).
    pub port: u16,
    /// Local port to listen for announcements on (0 = any).
    pub bind_port: u16,
    /// How long one broadcast waits for an answer before retrying.
    pub attempt_timeout: std::time::Duration,
    /// How many broadcasts to send before giving up.
    pub max_attempts: u32,
    /// Overall deadline across all attempts.
    pub overall_timeout: std::time::Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            broadcast_address: "255.255.255.255".to_string(),
            port: DEFAULT_PORT,
            bind_port: DEFAULT_PORT,
            attempt_timeout: std::time::Duration::from_secs(1),
            max_attempts: 3,
            overall_timeout: std::time::Duration::from_secs(3),
        }
    }
}

/// A receiver found on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedDevice {
    /// Device category character from the announcement.
    pub category: char,
    /// Model name (e.g. `"NR809"`).
    pub model: String,
    /// Port the device accepts ISCP connections on.
    pub iscp_port: u16,
    /// Sales region, decoded from the area code (raw code if unknown).
    pub area: String,
    /// Stable 12-character device identifier (typically the MAC address).
    pub identifier: String,
    /// IP address the announcement came from.
    pub address: IpAddr,
    /// UDP source port of the announcement.
    pub port: u16,
}

impl fmt::Display for DetectedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) at {}:{}",
            self.model, self.identifier, self.address, self.iscp_port
        )
    }
}

/// UDP broadcast discovery client.
///
/// Owns one UDP socket. Detections are cached by source address, so a
/// device that answers every retry is reported once.
pub struct Discovery {
    options: DiscoveryOptions,
    socket: Option<UdpTransport>,
    cache: HashMap<IpAddr, DetectedDevice>,
    detected_tx: broadcast::Sender<DetectedDevice>,
}

impl Discovery {
    /// Bind the discovery socket and enable broadcast.
    ///
    /// Fails if the local port is already in use.
    pub async fn bind(options: DiscoveryOptions) -> Result<Self> {
        let socket = listen(options.bind_port).await?;
        let (detected_tx, _) = broadcast::channel(DETECTED_CHANNEL_CAPACITY);
        Ok(Self {
            options,
            socket: Some(socket),
            cache: HashMap::new(),
            detected_tx,
        })
    }

    /// Whether the discovery socket is currently bound.
    pub fn is_listening(&self) -> bool {
        self.socket.is_some()
    }

    /// Close the discovery socket. A later
    /// [`discover_first`](Discovery::discover_first) re-binds it.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            tracing::debug!("Discovery socket closed");
        }
    }

    /// Devices detected so far, in no particular order.
    pub fn detected(&self) -> Vec<DetectedDevice> {
        self.cache.values().cloned().collect()
    }

    /// Subscribe to detection events.
    ///
    /// Repeated announcements from a known address re-emit the cached
    /// record.
    pub fn subscribe(&self) -> broadcast::Receiver<DetectedDevice> {
        self.detected_tx.subscribe()
    }

    /// Broadcast discovery requests until a device answers.
    ///
    /// Sends up to `max_attempts` broadcasts, waiting `attempt_timeout`
    /// after each, all bounded by `overall_timeout`. Resolves with the
    /// first valid announcement.
    ///
    /// # Errors
    ///
    /// [`Error::DiscoveryTimeout`] when every attempt goes unanswered; the
    /// socket is closed on that path.
    pub async fn discover_first(&mut self) -> Result<DetectedDevice> {
        if self.socket.is_none() {
            self.socket = Some(listen(self.options.bind_port).await?);
        }

        let target: SocketAddr = format!("{}:{}", self.options.broadcast_address, self.options.port)
            .parse()
            .map_err(|e| Error::Transport(format!("bad broadcast address: {e}")))?;
        let request = frame::encode(commands::DISCOVERY_MAGIC);
        let deadline = tokio::time::Instant::now() + self.options.overall_timeout;
        let mut buf = [0u8; 1024];

        for attempt in 1..=self.options.max_attempts {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            let socket = match self.socket.as_ref() {
                Some(socket) => socket,
                None => return Err(Error::NotConnected),
            };

            tracing::debug!(attempt, target = %target, "Broadcasting discovery request");
            socket.send_to(&request, target).await?;

            let attempt_deadline = cmp::min(
                tokio::time::Instant::now() + self.options.attempt_timeout,
                deadline,
            );
            loop {
                let now = tokio::time::Instant::now();
                if now >= attempt_deadline {
                    break;
                }
                match socket.recv_from(&mut buf, attempt_deadline - now).await {
                    Ok((n, src)) => {
                        if let Some(device) =
                            handle_datagram(&mut self.cache, &self.detected_tx, &buf[..n], src)
                        {
                            return Ok(device);
                        }
                    }
                    Err(Error::Timeout) => break,
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::debug!(
            attempts = self.options.max_attempts,
            "No device answered discovery"
        );
        self.close();
        Err(Error::DiscoveryTimeout)
    }
}

/// Bind the discovery socket with broadcast enabled.
async fn listen(bind_port: u16) -> Result<UdpTransport> {
    let socket = UdpTransport::bind_port(bind_port).await?;
    socket.set_broadcast(true)?;
    tracing::debug!(local = %socket.local_addr(), "Listening for announcements");
    Ok(socket)
}

/// Classify one inbound datagram; returns the detected device, if any.
///
/// Our own broadcast comes back on the same socket, so the discovery
/// request body is filtered out rather than reported.
fn handle_datagram(
    cache: &mut HashMap<IpAddr, DetectedDevice>,
    detected_tx: &broadcast::Sender<DetectedDevice>,
    data: &[u8],
    src: SocketAddr,
) -> Option<DetectedDevice> {
    let message = match frame::decode(data) {
        Ok(message) => message,
        Err(e) => {
            tracing::trace!(from = %src, error = %e, "Ignoring undecodable datagram");
            return None;
        }
    };

    if message == commands::DISCOVERY_MAGIC[2..] {
        tracing::trace!(from = %src, "Filtered discovery echo");
        return None;
    }

    match parse_announcement(&message, src) {
        Ok(device) => {
            let device = match cache.entry(src.ip()) {
                Entry::Occupied(entry) => entry.get().clone(),
                Entry::Vacant(entry) => {
                    tracing::info!(model = %device.model, address = %src, "Detected receiver");
                    entry.insert(device).clone()
                }
            };
            let _ = detected_tx.send(device.clone());
            Some(device)
        }
        Err(e) => {
            tracing::debug!(from = %src, error = %e, "Announcement parse failed");
            None
        }
    }
}

/// Parse a device announcement.
///
/// Format: `<tag><model>/<port>/<area code>/<identifier>`, where the model
/// name starts at byte 6 of the first field and the category character is
/// byte 1. The identifier is truncated to its stable 12-character prefix.
pub fn parse_announcement(message: &str, src: SocketAddr) -> Result<DetectedDevice> {
    let fields: Vec<&str> = message.split('/').collect();
    if fields.len() < 4 {
        return Err(Error::MalformedFrame(format!(
            "announcement needs 4 fields: {message:?}"
        )));
    }

    let head = fields[0];
    if head.len() <= MODEL_OFFSET || !head.is_ascii() {
        return Err(Error::MalformedFrame(format!(
            "announcement header too short: {head:?}"
        )));
    }
    let category = head.as_bytes()[1] as char;
    let model = head[MODEL_OFFSET..].to_string();

    let iscp_port: u16 = fields[1].parse().map_err(|_| {
        Error::MalformedFrame(format!("bad port in announcement: {:?}", fields[1]))
    })?;

    let area = area_label(fields[2])
        .unwrap_or(fields[2])
        .to_string();

    let identifier: String = fields[3].chars().take(IDENTIFIER_LEN).collect();

    Ok(DetectedDevice {
        category,
        model,
        iscp_port,
        area,
        identifier,
        address: src.ip(),
        port: src.port(),
    })
}

/// Decode a sales-region code.
fn area_label(code: &str) -> Option<&'static str> {
    match code {
        "DX" => Some("North American model"),
        "XX" => Some("European or Asian model"),
        "JJ" => Some("Japanese model"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const ANNOUNCEMENT: &str = "ECNTX-NR809/60128/XX/0009B04530D1";

    fn test_options(target_port: u16) -> DiscoveryOptions {
        DiscoveryOptions {
            broadcast_address: "127.0.0.1".to_string(),
            port: target_port,
            bind_port: 0,
            attempt_timeout: Duration::from_millis(100),
            max_attempts: 3,
            overall_timeout: Duration::from_secs(2),
        }
    }

    /// A fake receiver: answers `respond_times` discovery requests, echoing
    /// the request back first when `echo` is set (broadcast loopback).
    async fn spawn_responder(
        announcement: &'static str,
        respond_times: usize,
        echo: bool,
    ) -> (u16, tokio::task::JoinHandle<()>) {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            for _ in 0..respond_times {
                let (n, src) = socket.recv_from(&mut buf).await.unwrap();
                if echo {
                    socket.send_to(&buf[..n], src).await.unwrap();
                }
                socket
                    .send_to(&frame::encode_reply(announcement), src)
                    .await
                    .unwrap();
            }
        });
        (port, handle)
    }

    #[tokio::test]
    async fn parse_literal_announcement() {
        let src: SocketAddr = "192.168.0.23:60128".parse().unwrap();
        let device = parse_announcement(ANNOUNCEMENT, src).unwrap();

        assert_eq!(device.category, 'C');
        assert_eq!(device.model, "NR809");
        assert_eq!(device.iscp_port, 60128);
        assert_eq!(device.area, "European or Asian model");
        assert_eq!(device.identifier, "0009B04530D1");
        assert_eq!(device.address, src.ip());
        assert_eq!(device.port, 60128);
    }

    #[tokio::test]
    async fn parse_unknown_area_keeps_raw_code() {
        let src: SocketAddr = "10.0.0.1:60128".parse().unwrap();
        let device = parse_announcement("ECNTX-8050/60128/ZZ/001122334455", src).unwrap();
        assert_eq!(device.area, "ZZ");
    }

    #[tokio::test]
    async fn parse_truncates_identifier() {
        let src: SocketAddr = "10.0.0.1:60128".parse().unwrap();
        let device =
            parse_announcement("ECNTX-NR809/60128/DX/0009B04530D1AABBCC", src).unwrap();
        assert_eq!(device.identifier, "0009B04530D1");
        assert_eq!(device.area, "North American model");
    }

    #[tokio::test]
    async fn parse_rejects_bad_announcements() {
        let src: SocketAddr = "10.0.0.1:60128".parse().unwrap();
        for bad in ["ECNQSTN", "ECNTX/60128", "ECN/60128/XX/0009B04530D1", "ECNTX-NR809/sixty/XX/0009B04530D1"] {
            assert!(
                parse_announcement(bad, src).is_err(),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn discover_first_finds_device() {
        let (port, responder) = spawn_responder(ANNOUNCEMENT, 1, false).await;
        let mut discovery = Discovery::bind(test_options(port)).await.unwrap();

        let device = discovery.discover_first().await.unwrap();
        assert_eq!(device.model, "NR809");
        assert_eq!(device.address, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(discovery.detected().len(), 1);

        responder.await.unwrap();
    }

    #[tokio::test]
    async fn discover_first_filters_own_echo() {
        // The responder echoes the request (as a broadcast socket hears its
        // own datagram) before answering properly.
        let (port, responder) = spawn_responder(ANNOUNCEMENT, 1, true).await;
        let mut discovery = Discovery::bind(test_options(port)).await.unwrap();

        let device = discovery.discover_first().await.unwrap();
        assert_eq!(device.model, "NR809");
        assert_eq!(discovery.detected().len(), 1, "echo must not be cached");

        responder.await.unwrap();
    }

    #[tokio::test]
    async fn repeated_announcements_deduplicate() {
        let (port, responder) = spawn_responder(ANNOUNCEMENT, 2, false).await;
        let mut discovery = Discovery::bind(test_options(port)).await.unwrap();

        let first = discovery.discover_first().await.unwrap();
        let second = discovery.discover_first().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(discovery.detected().len(), 1);

        responder.await.unwrap();
    }

    #[tokio::test]
    async fn detection_events_reach_subscribers() {
        let (port, responder) = spawn_responder(ANNOUNCEMENT, 1, false).await;
        let mut discovery = Discovery::bind(test_options(port)).await.unwrap();
        let mut detections = discovery.subscribe();

        let device = discovery.discover_first().await.unwrap();
        assert_eq!(detections.try_recv().unwrap(), device);

        responder.await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_retries_time_out_and_close_socket() {
        // Nobody answers on this port.
        let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let options = DiscoveryOptions {
            attempt_timeout: Duration::from_millis(50),
            max_attempts: 2,
            overall_timeout: Duration::from_secs(1),
            ..test_options(port)
        };
        let mut discovery = Discovery::bind(options).await.unwrap();
        assert!(discovery.is_listening());

        let result = discovery.discover_first().await;
        assert!(matches!(result, Err(Error::DiscoveryTimeout)));
        assert!(!discovery.is_listening(), "timeout must close the socket");
        assert!(discovery.detected().is_empty());
    }

    #[tokio::test]
    async fn discover_first_rebinds_after_close() {
        let (port, responder) = spawn_responder(ANNOUNCEMENT, 1, false).await;
        let mut discovery = Discovery::bind(test_options(port)).await.unwrap();
        discovery.close();
        assert!(!discovery.is_listening());

        let device = discovery.discover_first().await.unwrap();
        assert_eq!(device.model, "NR809");

        responder.await.unwrap();
    }
}
