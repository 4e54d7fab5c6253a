//! Frame reassembly from an arbitrarily-chunked TCP byte stream.
//!
//! TCP gives no framing guarantees: one read may deliver half a frame, two
//! frames and a bit of a third, or the tail end of a frame whose start was
//! never seen (a client attaching to a device that is mid-broadcast).
//! [`StreamReassembler`] turns that stream into discrete decoded messages.
//!
//! Two faults are tolerated:
//!
//! - **Offset input**: bytes before the next `ISCP` magic are discarded,
//!   so the stream recovers after joining mid-frame or after corruption.
//! - **Concatenation and fragmentation**: any number of complete frames
//!   per chunk, and frames split at any byte offset, including inside the
//!   magic itself.
//!
//! Extraction is strictly FIFO by buffer position; no frame is skipped or
//! merged.

use bytes::{Buf, BytesMut};

use crate::frame::{self, HEADER_LEN, MAGIC, TERMINATOR};

/// Reassembles complete eISCP frames from incoming byte chunks.
///
/// Owned by the session's reader task; each socket read is pushed in and
/// yields zero or more decoded messages.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    buf: BytesMut,
}

impl StreamReassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently buffered, waiting for a frame to complete.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append a chunk and extract every complete frame it unlocks.
    ///
    /// Messages are returned in wire order. A frame whose terminator has
    /// not arrived yet stays buffered untouched until the next push. Frames
    /// that fail to decode are logged and dropped; they never poison the
    /// stream.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut messages = Vec::new();
        loop {
            self.resync();

            if self.buf.len() <= HEADER_LEN || !self.buf.starts_with(MAGIC) {
                break;
            }

            // The device ends every frame with the EOF byte; everything up
            // to and including it is one frame.
            let Some(pos) = self.buf[HEADER_LEN..].iter().position(|&b| b == TERMINATOR) else {
                break;
            };
            let frame_bytes = self.buf.split_to(HEADER_LEN + pos + 1);

            match frame::decode(&frame_bytes) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::warn!(error = %e, bytes = frame_bytes.len(), "Dropping malformed frame");
                }
            }

            // Devices pad with extra terminators (`\r\n` after the EOF
            // byte); strip them so the next frame starts at the head.
            while self.buf.first().is_some_and(|&b| frame::is_sentinel(b)) {
                self.buf.advance(1);
            }
        }
        messages
    }

    /// Discard garbage until the buffer starts with the frame magic.
    ///
    /// If no magic is present, all but the last `MAGIC.len() - 1` bytes are
    /// dropped so a magic sequence split across chunk boundaries can still
    /// complete on the next read.
    fn resync(&mut self) {
        while self.buf.len() > MAGIC.len() && !self.buf.starts_with(MAGIC) {
            match find_magic(&self.buf) {
                Some(offset) => {
                    tracing::debug!(discarded = offset, "Resynchronized to frame magic");
                    self.buf.advance(offset);
                }
                None => {
                    let keep = MAGIC.len() - 1;
                    let discard = self.buf.len() - keep;
                    tracing::debug!(discarded = discard, "No frame magic in buffer");
                    self.buf.advance(discard);
                }
            }
        }
    }
}

/// Position of the first `ISCP` magic occurrence, if any.
fn find_magic(buf: &[u8]) -> Option<usize> {
    buf.windows(MAGIC.len()).position(|w| w == MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_reply;

    #[test]
    fn single_frame_single_chunk() {
        let mut r = StreamReassembler::new();
        let messages = r.push(&encode_reply("PWR01"));
        assert_eq!(messages, vec!["PWR01"]);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn two_frames_one_chunk() {
        let mut r = StreamReassembler::new();
        let mut chunk = encode_reply("PWR01");
        chunk.extend_from_slice(&encode_reply("MVL42"));

        let messages = r.push(&chunk);
        assert_eq!(messages, vec!["PWR01", "MVL42"]);
    }

    #[test]
    fn frame_split_at_every_offset() {
        let frame = encode_reply("AMT00");
        for split in 1..frame.len() {
            let mut r = StreamReassembler::new();
            assert!(
                r.push(&frame[..split]).is_empty(),
                "no message expected after {split} bytes"
            );
            let messages = r.push(&frame[split..]);
            assert_eq!(messages, vec!["AMT00"], "split at {split}");
        }
    }

    #[test]
    fn junk_before_frame_is_discarded() {
        let mut r = StreamReassembler::new();
        let mut chunk = b"not a frame at all".to_vec();
        chunk.extend_from_slice(&encode_reply("PWR00"));

        let messages = r.push(&chunk);
        assert_eq!(messages, vec!["PWR00"]);
    }

    #[test]
    fn magic_split_across_junk_boundary() {
        let mut r = StreamReassembler::new();
        let frame = encode_reply("SLI24");

        // Junk chunk ending with the first half of the magic.
        assert!(r.push(b"garbage bytes IS").is_empty());

        // Remainder of the frame, starting inside the magic.
        let messages = r.push(&frame[2..]);
        assert_eq!(messages, vec!["SLI24"]);
    }

    #[test]
    fn junk_only_keeps_small_tail() {
        let mut r = StreamReassembler::new();
        assert!(r.push(&[0xAAu8; 4096]).is_empty());
        assert!(r.buffered() < MAGIC.len(), "junk should not accumulate");
    }

    #[test]
    fn incomplete_frame_waits_for_more_data() {
        let mut r = StreamReassembler::new();
        let frame = encode_reply("MVL10");

        // Header complete, payload (and terminator) still missing.
        assert!(r.push(&frame[..HEADER_LEN + 3]).is_empty());
        assert_eq!(r.buffered(), HEADER_LEN + 3);

        let messages = r.push(&frame[HEADER_LEN + 3..]);
        assert_eq!(messages, vec!["MVL10"]);
    }

    #[test]
    fn malformed_frame_is_dropped_stream_continues() {
        let mut r = StreamReassembler::new();

        // Valid envelope but a bad version byte.
        let mut bad = encode_reply("PWR01");
        bad[12] = 9;
        bad.extend_from_slice(&encode_reply("MVL33"));

        let messages = r.push(&bad);
        assert_eq!(messages, vec!["MVL33"]);
    }

    #[test]
    fn interleaved_junk_between_frames() {
        let mut r = StreamReassembler::new();
        let mut chunk = encode_reply("PWR01");
        chunk.extend_from_slice(b"\xff\xfe line noise");
        chunk.extend_from_slice(&encode_reply("AMT01"));

        let messages = r.push(&chunk);
        assert_eq!(messages, vec!["PWR01", "AMT01"]);
    }
}
