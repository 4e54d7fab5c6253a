//! Scripted mock receiver for session-level testing.
//!
//! [`MockReceiver`] is a TCP listener pre-loaded with scripted exchanges,
//! enabling deterministic testing of the full session path (connect, frame,
//! correlate, dispatch) without real hardware. It implements the device
//! side of the wire format itself: commands arrive as `\r`-terminated
//! frames, replies go out with the `\x1a\r\n` trailer real units send.
//!
//! # Example
//!
//! ```no_run
//! use avrlib_test_harness::MockReceiver;
//!
//! # async fn example() -> avrlib_core::Result<()> {
//! let mut device = MockReceiver::new().await?;
//! // When the client sends PWRQSTN, answer that the unit is on.
//! device.expect("PWRQSTN", &["PWR01"]);
//! let addr = device.addr().to_string();
//! device.start();
//! // ... connect a client to `addr`, run the test, then:
//! device.wait().await.expect("all expectations met");
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use avrlib_core::error::{Error, Result};

/// Largest command payload the mock will accept.
const MAX_COMMAND_LEN: usize = 1024;

/// How long the mock keeps the connection open after the script completes,
/// so the client side can finish and disconnect first.
const LINGER: Duration = Duration::from_millis(200);

/// One scripted exchange: a command the client is expected to send and the
/// status messages pushed back in response.
#[derive(Debug, Clone)]
struct Expectation {
    command: String,
    replies: Vec<String>,
}

/// A scripted TCP eISCP device.
///
/// Accepts a single connection and processes expectations in order. An
/// expectation with no replies swallows the command, which is how a
/// command timeout is scripted. Extra replies model unsolicited pushes.
pub struct MockReceiver {
    listener: Option<TcpListener>,
    addr: String,
    expectations: VecDeque<Expectation>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockReceiver {
    /// Bind a mock receiver on a random localhost port.
    ///
    /// The listener does not accept connections until
    /// [`start`](MockReceiver::start) is called, so expectations can be
    /// loaded first.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock receiver: {}", e)))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();
        Ok(Self {
            listener: Some(listener),
            addr,
            expectations: VecDeque::new(),
            server_handle: None,
        })
    }

    /// Queue an expected command and the replies it triggers.
    ///
    /// `command` and `replies` are bare message text, without markers or
    /// terminators (`"PWRQSTN"`, `"PWR01"`).
    pub fn expect(&mut self, command: &str, replies: &[&str]) {
        self.expectations.push_back(Expectation {
            command: command.to_string(),
            replies: replies.iter().map(|r| r.to_string()).collect(),
        });
    }

    /// The address the mock is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Accept one connection and run the script in a background task.
    ///
    /// Call [`wait`](MockReceiver::wait) afterwards to check that every
    /// expectation was met.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let expectations: Vec<Expectation> = self.expectations.drain(..).collect();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {}", e))?;

            for (i, expectation) in expectations.iter().enumerate() {
                let command = read_command(&mut stream)
                    .await
                    .map_err(|e| format!("expectation {}: {}", i, e))?;
                if command != expectation.command {
                    return Err(format!(
                        "expectation {}: expected command {:?}, got {:?}",
                        i, expectation.command, command
                    ));
                }
                for reply in &expectation.replies {
                    stream
                        .write_all(&encode_reply(reply))
                        .await
                        .map_err(|e| format!("expectation {}: write error: {}", i, e))?;
                }
                stream
                    .flush()
                    .await
                    .map_err(|e| format!("expectation {}: flush error: {}", i, e))?;
            }

            tokio::time::sleep(LINGER).await;
            Ok(())
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the script to complete and surface any mismatch.
    pub async fn wait(self) -> std::result::Result<(), String> {
        if let Some(handle) = self.server_handle {
            handle
                .await
                .map_err(|e| format!("mock receiver task panicked: {}", e))?
        } else {
            Ok(())
        }
    }
}

/// Read one framed command and return its bare message text.
async fn read_command(stream: &mut TcpStream) -> std::result::Result<String, String> {
    let mut header = [0u8; 16];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| format!("header read error: {}", e))?;

    if &header[..4] != b"ISCP" {
        return Err(format!("bad magic: {:02X?}", &header[..4]));
    }
    let len = u32::from_be_bytes(header[8..12].try_into().unwrap()) as usize;
    if len == 0 || len > MAX_COMMAND_LEN {
        return Err(format!("implausible payload length {}", len));
    }

    let mut body = vec![0u8; len];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| format!("payload read error: {}", e))?;

    let text = String::from_utf8(body).map_err(|_| "payload is not ASCII".to_string())?;
    let text = text.trim_end_matches(['\r', '\n', '\u{1a}', '\0']);
    // Strip the two-character unit-type marker (`!1`, `!x`).
    let text = match text.strip_prefix('!') {
        Some(rest) if !rest.is_empty() => &rest[1..],
        _ => text,
    };
    Ok(text.to_string())
}

/// Frame a status message the way a device does.
fn encode_reply(message: &str) -> Vec<u8> {
    let body = format!("!1{message}\x1a\r\n");
    let mut frame = Vec::with_capacity(16 + body.len());
    frame.extend_from_slice(b"ISCP");
    frame.extend_from_slice(&16u32.to_be_bytes());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.push(1);
    frame.extend_from_slice(&[0, 0, 0]);
    frame.extend_from_slice(body.as_bytes());
    frame
}
