//! Error types for avrlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, framing-layer, and
//! command-layer errors are all captured here.

/// The error type for all avrlib operations.
///
/// Variants cover the full range of failure modes encountered when talking
/// to a networked AV receiver: transport failures, framing violations,
/// command timeouts, and unsupported commands.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (TCP socket, UDP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// A received frame violated the wire format (bad magic, bad header
    /// length, missing terminator). Fatal to the single frame only; the
    /// connection stays up.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A decoded parameter did not match the expected format for its group
    /// (e.g. a volume level that is not two hex digits).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Timed out waiting for the receiver to answer a command.
    ///
    /// This typically means the receiver does not implement the command,
    /// or the unit is in a standby state where it stops responding.
    #[error("timeout waiting for response")]
    Timeout,

    /// No receiver announced itself before the discovery deadline.
    #[error("no device discovered before the deadline")]
    DiscoveryTimeout,

    /// The requested symbolic command is not present in the command table.
    #[error("unsupported command: {0}")]
    Unsupported(String),

    /// Establishing the connection to the receiver failed.
    #[error("could not connect: {0}")]
    NotConnectable(String),

    /// No connection to the receiver has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the receiver was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A newer command for the same response group replaced this one while
    /// it was still waiting.
    ///
    /// Only one response waiter per group is kept; callers that interleave
    /// commands within a group see this instead of a silently stolen reply.
    #[error("superseded by a newer command for the same group")]
    Superseded,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
