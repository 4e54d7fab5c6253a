//! eISCP frame encoding and decoding.
//!
//! Every message travels in a fixed binary envelope:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "ISCP"
//! 4       4     header length, big-endian, always 16
//! 8       4     payload length, big-endian (includes the terminator)
//! 12      1     version, always 0x01
//! 13      3     reserved, zero
//! 16      ...   ASCII payload: "!1" + message, sentinel-terminated
//! ```
//!
//! Outbound payloads are terminated with `\r`; devices terminate with any
//! run of `\x1a`, `\r`, `\n` (and occasionally `\0` padding). The payload
//! text proper begins at offset 18: the two bytes after the header are the
//! unit-type start marker (`!1` toward a receiver, `!x` in the discovery
//! request) and are not part of the message.
//!
//! All encoding/decoding in this module is pure -- no I/O is performed.

use bytes::{BufMut, BytesMut};

use avrlib_core::error::{Error, Result};

/// Frame magic bytes.
pub const MAGIC: &[u8; 4] = b"ISCP";

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 16;

/// Offset where the message text begins: header plus the 2-byte start marker.
pub const PAYLOAD_OFFSET: usize = 18;

/// Protocol version carried in every frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// End-of-message byte devices append to every TCP frame.
pub const TERMINATOR: u8 = 0x1A;

/// Returns `true` for bytes that may terminate or pad a payload.
pub fn is_sentinel(byte: u8) -> bool {
    matches!(byte, 0x00 | b'\n' | b'\r' | 0x1A)
}

/// Encode a message into a complete eISCP frame.
///
/// Prepends the `!1` receiver start marker unless the message already
/// carries a marker of its own (the discovery request uses `!x`), appends
/// the `\r` terminator, and writes the 16-byte header. The payload-length
/// field counts marker, message, and terminator.
///
/// # Example
///
/// ```
/// use avrlib_eiscp::frame;
///
/// let bytes = frame::encode("PWRQSTN");
/// assert_eq!(&bytes[..4], b"ISCP");
/// assert_eq!(&bytes[16..], b"!1PWRQSTN\r");
/// ```
pub fn encode(message: &str) -> Vec<u8> {
    let marker = if message.starts_with('!') { "" } else { "!1" };
    let body_len = marker.len() + message.len() + 1;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    buf.put_slice(MAGIC);
    buf.put_u32(HEADER_LEN as u32);
    buf.put_u32(body_len as u32);
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_bytes(0, 3);
    buf.put_slice(marker.as_bytes());
    buf.put_slice(message.as_bytes());
    buf.put_u8(b'\r');
    buf.to_vec()
}

/// Encode a message the way devices frame their replies: `!1` marker, then
/// the EOF byte plus `\r\n`, with the payload-length field counting all
/// three terminators.
///
/// The library itself only sends [`encode`]-style frames; this is the
/// device side of the wire format, used by the test harness to emulate a
/// receiver.
pub fn encode_reply(message: &str) -> Vec<u8> {
    let body_len = 2 + message.len() + 3;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    buf.put_slice(MAGIC);
    buf.put_u32(HEADER_LEN as u32);
    buf.put_u32(body_len as u32);
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_bytes(0, 3);
    buf.put_slice(b"!1");
    buf.put_slice(message.as_bytes());
    buf.put_slice(b"\x1a\r\n");
    buf.to_vec()
}

/// Decode a complete eISCP frame into its message text.
///
/// The frame must start at byte 0 with a valid header. Returns the payload
/// after the 18-byte door (header + start marker) with every trailing
/// sentinel byte stripped.
///
/// # Errors
///
/// [`Error::MalformedFrame`] if the buffer is shorter than the door, the
/// magic or header fields are wrong, the payload is not terminated by a
/// sentinel, or the payload is not valid ASCII text.
pub fn decode(frame: &[u8]) -> Result<String> {
    if frame.len() < PAYLOAD_OFFSET {
        return Err(Error::MalformedFrame(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }
    if &frame[..MAGIC.len()] != MAGIC {
        return Err(Error::MalformedFrame("missing ISCP magic".into()));
    }

    let header_len = u32::from_be_bytes(frame[4..8].try_into().unwrap()) as usize;
    if header_len != HEADER_LEN {
        return Err(Error::MalformedFrame(format!(
            "unexpected header length {header_len}"
        )));
    }

    let version = frame[12];
    if version != PROTOCOL_VERSION {
        return Err(Error::MalformedFrame(format!(
            "unsupported protocol version {version}"
        )));
    }

    // The declared length counts trailing sentinels; a frame sliced at the
    // EOF byte may run short of it, never past it.
    let declared = u32::from_be_bytes(frame[8..12].try_into().unwrap()) as usize;
    if frame.len() - HEADER_LEN > declared {
        return Err(Error::MalformedFrame(format!(
            "payload runs past its declared length ({} > {})",
            frame.len() - HEADER_LEN,
            declared
        )));
    }

    let body = &frame[PAYLOAD_OFFSET..];
    let end = body
        .iter()
        .rposition(|&b| !is_sentinel(b))
        .map(|i| i + 1)
        .unwrap_or(0);
    if end == body.len() {
        return Err(Error::MalformedFrame("payload not terminated".into()));
    }

    let text = std::str::from_utf8(&body[..end])
        .map_err(|_| Error::MalformedFrame("payload is not ASCII text".into()))?;
    Ok(text.to_string())
}
