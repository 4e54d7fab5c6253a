//! eISCP session client: connection lifecycle and command correlation.
//!
//! [`EiscpClient`] owns one TCP connection to a receiver. A background
//! reader task has exclusive use of the transport: it drains inbound bytes
//! through the [`StreamReassembler`](crate::stream::StreamReassembler) and
//! dispatches every decoded message; outbound writes are funneled to it
//! over a channel, so all socket access is serialized in one place.
//!
//! Responses carry no request id. A command's first three characters name
//! the status group the receiver will answer on, so the client registers a
//! single-slot waiter per group and resolves it with the next decoded value
//! for that group -- solicited or not. Unsolicited status pushes update the
//! cached [`DeviceState`](crate::state::DeviceState) and reach subscribers
//! either way.
//!
//! The connection is opened lazily: the first command (or an explicit
//! [`connect`](EiscpClient::connect)) establishes it, and concurrent callers
//! never race to open duplicates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use avrlib_core::error::{Error, Result};
use avrlib_core::events::DeviceEvent;
use avrlib_core::transport::Transport;
use avrlib_core::types::PropertyValue;
use avrlib_transport::TcpTransport;

use crate::commands::CommandSet;
use crate::correlate::PendingCommands;
use crate::decoders::DecoderTable;
use crate::dispatch::Dispatcher;
use crate::discovery::DetectedDevice;
use crate::frame;
use crate::state::DeviceState;
use crate::stream::StreamReassembler;

/// Well-known eISCP TCP and discovery port.
pub const DEFAULT_PORT: u16 = 60128;

/// Default command response timeout (4 seconds).
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(4);

/// Default TCP connect timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Broadcast channel capacity for DeviceEvent subscribers.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Outbound write queue depth.
const WRITE_CHANNEL_CAPACITY: usize = 16;

/// How long one idle read waits before the reader loop re-checks for writes.
const IDLE_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Options for configuring an eISCP session.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Timeout for individual command responses.
    pub command_timeout: Duration,
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Symbolic command table, resolved once at construction.
    pub commands: CommandSet,
    /// Per-group parameter decoders, resolved once at construction.
    pub decoders: DecoderTable,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            commands: CommandSet::receiver_defaults(),
            decoders: DecoderTable::receiver_defaults(),
        }
    }
}

/// A queued outbound write, acknowledged once handed to the transport.
struct WriteRequest {
    bytes: Vec<u8>,
    done: oneshot::Sender<Result<()>>,
}

/// One established connection: its write queue and reader task.
struct Connection {
    write_tx: mpsc::Sender<WriteRequest>,
    reader: JoinHandle<()>,
    connected: Arc<AtomicBool>,
}

/// Asynchronous client for one eISCP receiver.
///
/// Cheap accessors ([`state`](EiscpClient::state),
/// [`subscribe`](EiscpClient::subscribe)) never touch the network; command
/// methods connect on demand.
pub struct EiscpClient {
    host: String,
    port: u16,
    command_timeout: Duration,
    connect_timeout: Duration,
    commands: CommandSet,
    decoders: DecoderTable,
    conn: Mutex<Option<Connection>>,
    pending: Arc<Mutex<PendingCommands>>,
    state: Arc<Mutex<DeviceState>>,
    event_tx: broadcast::Sender<DeviceEvent>,
}

impl EiscpClient {
    /// Create a client for `host` on the default port, with default options.
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_options(host, DEFAULT_PORT, ClientOptions::default())
    }

    /// Create a client with an explicit port and options.
    pub fn with_options(host: impl Into<String>, port: u16, options: ClientOptions) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            host: host.into(),
            port,
            command_timeout: options.command_timeout,
            connect_timeout: options.connect_timeout,
            commands: options.commands,
            decoders: options.decoders,
            conn: Mutex::new(None),
            pending: Arc::new(Mutex::new(PendingCommands::default())),
            state: Arc::new(Mutex::new(DeviceState::default())),
            event_tx,
        }
    }

    /// Create a client for a device found by
    /// [`Discovery`](crate::discovery::Discovery).
    pub fn from_detected(device: &DetectedDevice) -> Self {
        Self::with_options(
            device.address.to_string(),
            device.iscp_port,
            ClientOptions::default(),
        )
    }

    /// The configured device host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The configured device port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Establish the connection now instead of on the first command.
    ///
    /// A no-op if already connected.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_connected().await
    }

    /// Attach an already-established transport as this client's session.
    ///
    /// Used by tests to drive the session over a mock transport; real
    /// connections go through [`connect`](EiscpClient::connect).
    pub async fn connect_transport(&self, transport: Box<dyn Transport>) -> Result<()> {
        let mut conn = self.conn.lock().await;
        if conn
            .as_ref()
            .is_some_and(|c| c.connected.load(Ordering::SeqCst))
        {
            return Err(Error::Transport("already connected".into()));
        }
        if let Some(stale) = conn.take() {
            let _ = stale.reader.await;
        }
        *conn = Some(self.spawn_session(transport));
        let _ = self.event_tx.send(DeviceEvent::Connected);
        Ok(())
    }

    /// Resolve a symbolic command and send it, awaiting the decoded reply.
    ///
    /// The lookup happens before any network I/O:
    /// [`Error::Unsupported`] is returned without ever connecting.
    pub async fn send_command(&self, group: &str, command: &str) -> Result<PropertyValue> {
        let opcode = self
            .commands
            .resolve(group, command)
            .ok_or_else(|| Error::Unsupported(format!("{group}.{command}")))?
            .to_string();
        self.send_raw(&opcode).await
    }

    /// Send a wire opcode and await the decoded reply.
    ///
    /// The first three characters of the opcode name the status group the
    /// receiver answers on. Only one waiter per group is kept: a newer
    /// command for the same group completes an older in-flight one with
    /// [`Error::Superseded`]. Connects on demand if no session is open.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnectable`] if the connection cannot be established,
    /// [`Error::Timeout`] if no matching status message arrives in time
    /// (the connection stays open), [`Error::ConnectionLost`] if the
    /// session dies while waiting.
    pub async fn send_raw(&self, opcode: &str) -> Result<PropertyValue> {
        let bare = opcode.strip_prefix("!1").unwrap_or(opcode);
        if bare.len() < 3 || !bare.is_ascii() {
            return Err(Error::InvalidParameter(format!(
                "opcode needs a 3-character group: {opcode:?}"
            )));
        }
        let group = &bare[..3];

        self.ensure_connected().await?;

        let (ticket, response) = self.pending.lock().await.register(group);
        tracing::debug!(opcode = bare, "TX");

        if let Err(e) = self.write(frame::encode(bare)).await {
            self.pending.lock().await.cancel(group, ticket);
            return Err(e);
        }

        match tokio::time::timeout(self.command_timeout, response).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::ConnectionLost),
            Err(_) => {
                // Only this command gives up; its slot is freed unless a
                // newer command already took it over.
                self.pending.lock().await.cancel(group, ticket);
                tracing::debug!(opcode = bare, "Command timed out");
                Err(Error::Timeout)
            }
        }
    }

    /// Turn the main zone on, unless the receiver reports it already is.
    pub async fn power_on(&self) -> Result<PropertyValue> {
        let status = self.send_command("POWER", "STATUS").await?;
        if status.as_switch() == Some(true) {
            return Ok(status);
        }
        self.send_command("POWER", "ON").await
    }

    /// Put the main zone into standby, unless it already is.
    pub async fn power_off(&self) -> Result<PropertyValue> {
        let status = self.send_command("POWER", "STATUS").await?;
        if status.as_switch() == Some(false) {
            return Ok(status);
        }
        self.send_command("POWER", "OFF").await
    }

    /// Query the main-zone power state.
    pub async fn power_state(&self) -> Result<PropertyValue> {
        self.send_command("POWER", "STATUS").await
    }

    /// Mute the main zone.
    pub async fn mute(&self) -> Result<PropertyValue> {
        self.send_command("AUDIO", "MUTE").await
    }

    /// Unmute the main zone.
    pub async fn unmute(&self) -> Result<PropertyValue> {
        self.send_command("AUDIO", "UNMUTE").await
    }

    /// Step the master volume up.
    pub async fn volume_up(&self) -> Result<PropertyValue> {
        self.send_command("AUDIO", "VOL_UP").await
    }

    /// Step the master volume down.
    pub async fn volume_down(&self) -> Result<PropertyValue> {
        self.send_command("AUDIO", "VOL_DOWN").await
    }

    /// Select a main-zone input by symbolic name (e.g. `"FM"`, `"BD/DVD"`).
    pub async fn set_source(&self, source: &str) -> Result<PropertyValue> {
        self.send_command("SOURCE_SELECT", source).await
    }

    /// A snapshot of the last-known receiver state.
    pub async fn state(&self) -> DeviceState {
        self.state.lock().await.clone()
    }

    /// Subscribe to device events.
    ///
    /// Multiple subscribers can exist; each gets an independent copy of
    /// every event.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.event_tx.subscribe()
    }

    /// Whether a session is currently established.
    pub async fn is_connected(&self) -> bool {
        self.conn
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| c.connected.load(Ordering::SeqCst))
    }

    /// Close the session.
    ///
    /// Outstanding commands fail with [`Error::ConnectionLost`]; a later
    /// command reconnects on demand. A no-op when not connected.
    pub async fn disconnect(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        if let Some(c) = conn.take() {
            tracing::debug!(host = %self.host, "Disconnecting");
            drop(c.write_tx);
            let _ = c.reader.await;
        }
        Ok(())
    }

    /// Connect if no live session exists.
    ///
    /// The connection mutex is held across the attempt, so concurrent
    /// callers queue here and observe the same established session instead
    /// of racing to open their own.
    async fn ensure_connected(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        if let Some(existing) = conn.as_ref() {
            if existing.connected.load(Ordering::SeqCst) {
                return Ok(());
            }
            // The reader exited (connection lost); reap it before reconnecting.
            if let Some(stale) = conn.take() {
                let _ = stale.reader.await;
            }
        }

        let addr = format!("{}:{}", self.host, self.port);
        tracing::debug!(addr = %addr, "Connecting on demand");
        let transport = TcpTransport::connect_with_timeout(&addr, self.connect_timeout)
            .await
            .map_err(|e| Error::NotConnectable(e.to_string()))?;

        *conn = Some(self.spawn_session(Box::new(transport)));
        let _ = self.event_tx.send(DeviceEvent::Connected);
        tracing::info!(addr = %addr, "Session established");
        Ok(())
    }

    /// Spawn the reader task that owns the transport.
    fn spawn_session(&self, transport: Box<dyn Transport>) -> Connection {
        let (write_tx, write_rx) = mpsc::channel(WRITE_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(true));
        let dispatcher = Dispatcher::new(
            self.decoders.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.pending),
            self.event_tx.clone(),
        );
        let reader = tokio::spawn(reader_loop(
            transport,
            dispatcher,
            write_rx,
            Arc::clone(&self.pending),
            self.event_tx.clone(),
            Arc::clone(&connected),
        ));
        Connection {
            write_tx,
            reader,
            connected,
        }
    }

    /// Queue one frame for the reader task to write.
    async fn write(&self, bytes: Vec<u8>) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        {
            let conn = self.conn.lock().await;
            let conn = conn.as_ref().ok_or(Error::NotConnected)?;
            conn.write_tx
                .send(WriteRequest {
                    bytes,
                    done: done_tx,
                })
                .await
                .map_err(|_| Error::ConnectionLost)?;
        }
        done_rx.await.map_err(|_| Error::ConnectionLost)?
    }
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

/// The main loop of the background reader task.
///
/// Owns the transport exclusively. Uses `tokio::select! { biased; }` to
/// prioritize queued writes over idle reads. Any transport failure tears
/// the session down: pending commands fail with `ConnectionLost` and a
/// `Disconnected` event is broadcast.
async fn reader_loop(
    mut transport: Box<dyn Transport>,
    dispatcher: Dispatcher,
    mut write_rx: mpsc::Receiver<WriteRequest>,
    pending: Arc<Mutex<PendingCommands>>,
    event_tx: broadcast::Sender<DeviceEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut reassembler = StreamReassembler::new();
    let mut read_buf = [0u8; 1024];

    loop {
        tokio::select! {
            biased;

            // Priority: flush queued outbound frames.
            request = write_rx.recv() => match request {
                Some(WriteRequest { bytes, done }) => {
                    let result = transport.send(&bytes).await;
                    let failed = result.is_err();
                    let _ = done.send(result);
                    if failed {
                        tracing::debug!("Write failed, closing session");
                        break;
                    }
                }
                None => {
                    // Client dropped the connection handle (disconnect).
                    tracing::debug!("Session handle closed, reader exiting");
                    break;
                }
            },

            // Idle: drain inbound bytes into the reassembler. Frame
            // extraction stays inside the polled future so a completed read
            // is never lost to branch cancellation; dispatch happens in the
            // handler, outside cancellation.
            messages = async {
                match transport.receive(&mut read_buf, IDLE_READ_TIMEOUT).await {
                    Ok(n) => Some(reassembler.push(&read_buf[..n])),
                    Err(Error::Timeout) => Some(Vec::new()),
                    Err(e) => {
                        tracing::debug!(error = %e, "Receive failed, closing session");
                        None
                    }
                }
            } => match messages {
                Some(messages) => {
                    for message in &messages {
                        dispatcher.dispatch(message).await;
                    }
                }
                None => break,
            },
        }
    }

    connected.store(false, Ordering::SeqCst);
    let _ = transport.close().await;
    pending.lock().await.fail_all();
    let _ = event_tx.send(DeviceEvent::Disconnected);
    tracing::debug!("Reader task exited");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
