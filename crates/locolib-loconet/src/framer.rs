//! Byte-stream framer: recovers discrete LocoNet messages from a noisy
//! multi-master bus.
//!
//! LocoNet has no preamble or terminator; the only framing anchor is that
//! opcode bytes are the sole bytes with the high bit set, and the opcode
//! determines the frame length ([`checksum::length_class`]). The framer
//! scans for an opcode, collects the frame, validates the checksum, and
//! silently resynchronizes on corruption: a damaged candidate frame is
//! discarded and scanning resumes, so one burst of noise never poisons the
//! messages that follow.
//!
//! The framer never raises on malformed bus input -- [`Framer::next_message`]
//! simply yields `None` until a valid message is available. The one
//! exception is a variable-length frame declaring a total length below 3,
//! which is a hard [`Error::Protocol`] because it indicates a framing bug
//! rather than noise.

use std::time::Duration;

use tracing::debug;

use locolib_core::{Result, Transport};

use crate::checksum::{frame_length, verify};

/// Result of attempting to decode one frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete, validated frame. The `usize` is the number of bytes
    /// consumed from the input, leading noise included.
    Message(Vec<u8>, usize),

    /// The buffer does not yet contain a complete frame.
    Incomplete,

    /// A complete candidate frame failed checksum validation. The `usize`
    /// is the number of bytes to discard (noise plus the bad frame).
    Corrupt(usize),
}

/// Attempt to decode one LocoNet frame from the start of `buf`.
///
/// Bytes with the high bit clear ahead of the first opcode byte are
/// treated as inter-frame noise and counted into the consumed length of
/// the result. When `validate_checksum` is `false` (diagnostic mode),
/// length-valid frames are accepted regardless of checksum.
pub fn decode(buf: &[u8], validate_checksum: bool) -> Result<DecodeResult> {
    // Seek the first byte with the high bit set; everything before it is noise.
    let start = match buf.iter().position(|b| b & 0x80 != 0) {
        Some(pos) => pos,
        None => return Ok(DecodeResult::Incomplete),
    };
    let frame_buf = &buf[start..];

    let total = match frame_length(frame_buf)? {
        Some(total) => total,
        None => return Ok(DecodeResult::Incomplete),
    };
    if frame_buf.len() < total {
        return Ok(DecodeResult::Incomplete);
    }

    let frame = &frame_buf[..total];
    if validate_checksum && !verify(frame) {
        return Ok(DecodeResult::Corrupt(start + total));
    }
    Ok(DecodeResult::Message(frame.to_vec(), start + total))
}

/// Incremental framer over an accumulated byte buffer.
///
/// Feed inbound chunks with [`extend`](Framer::extend) and drain messages
/// with [`next_message`](Framer::next_message), one per call. State
/// between calls is just the unconsumed byte tail, so a message split
/// across transport reads is reassembled transparently.
#[derive(Debug)]
pub struct Framer {
    buf: Vec<u8>,
    validate_checksum: bool,
}

impl Framer {
    /// Create a framer with checksum validation enabled.
    pub fn new() -> Self {
        Self::with_checksum_validation(true)
    }

    /// Create a framer, optionally disabling checksum validation
    /// (diagnostic mode: length-valid frames pass through regardless).
    pub fn with_checksum_validation(validate_checksum: bool) -> Self {
        Framer {
            buf: Vec::new(),
            validate_checksum,
        }
    }

    /// Append inbound bytes from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Drain at most one validated message from the buffer.
    ///
    /// Returns `Ok(None)` when no complete valid message is available;
    /// corrupt candidate frames are discarded internally and scanning
    /// continues. Returns `Err` only for the illegal-declared-length
    /// format violation; the caller should [`resync`](Framer::resync) and
    /// carry on.
    pub fn next_message(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match decode(&self.buf, self.validate_checksum)? {
                DecodeResult::Message(frame, consumed) => {
                    self.buf.drain(..consumed);
                    return Ok(Some(frame));
                }
                DecodeResult::Incomplete => {
                    // Pure noise (no opcode byte anywhere) can never
                    // become a frame; drop it now.
                    if self.buf.iter().all(|b| b & 0x80 == 0) {
                        self.buf.clear();
                    }
                    return Ok(None);
                }
                DecodeResult::Corrupt(consumed) => {
                    debug!(discarded = consumed, "checksum mismatch, resyncing");
                    self.buf.drain(..consumed);
                }
            }
        }
    }

    /// Drop the current frame candidate (through its opcode byte) so the
    /// next [`next_message`](Framer::next_message) call rescans. Used
    /// after a hard format error.
    pub fn resync(&mut self) {
        if let Some(pos) = self.buf.iter().position(|b| b & 0x80 != 0) {
            self.buf.drain(..=pos);
        } else {
            self.buf.clear();
        }
    }

    /// Discard any partially collected frame after an inter-byte timeout.
    pub fn discard_partial(&mut self) {
        if !self.buf.is_empty() {
            debug!(discarded = self.buf.len(), "inter-byte timeout, discarding partial frame");
            self.buf.clear();
        }
    }

    /// Number of buffered, not-yet-consumed bytes.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

/// Read at most one message from a stream transport.
///
/// Loops transport reads into `framer` until a validated message is
/// available. Returns `Ok(None)` on inter-byte timeout (after discarding
/// any partial frame) so the caller's read loop simply continues; hard
/// format errors propagate after a resync.
pub async fn read_message(
    transport: &mut dyn Transport,
    framer: &mut Framer,
    timeout: Duration,
) -> Result<Option<Vec<u8>>> {
    let mut chunk = [0u8; 256];
    loop {
        match framer.next_message() {
            Ok(Some(frame)) => return Ok(Some(frame)),
            Ok(None) => {}
            Err(e) => {
                framer.resync();
                return Err(e);
            }
        }
        match transport.receive(&mut chunk, timeout).await {
            Ok(n) => framer.extend(&chunk[..n]),
            Err(locolib_core::Error::Timeout) => {
                framer.discard_partial();
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::append_checksum;

    #[test]
    fn two_byte_message() {
        let mut framer = Framer::new();
        framer.extend(&[0x83, 0x7C]);
        assert_eq!(framer.next_message().unwrap(), Some(vec![0x83, 0x7C]));
        assert_eq!(framer.next_message().unwrap(), None);
    }

    #[test]
    fn four_byte_message() {
        let frame = append_checksum(&[0xB0, 0x05, 0x30]);
        let mut framer = Framer::new();
        framer.extend(&frame);
        assert_eq!(framer.next_message().unwrap(), Some(frame));
    }

    #[test]
    fn six_byte_message() {
        let frame = append_checksum(&[0xD0, 0x21, 0x10, 0x7D, 0x03]);
        let mut framer = Framer::new();
        framer.extend(&frame);
        let msg = framer.next_message().unwrap().unwrap();
        assert_eq!(msg.len(), 6);
        assert_eq!(msg, frame);
    }

    #[test]
    fn fourteen_byte_slot_data() {
        let mut body = vec![0xE7, 0x0E];
        body.extend_from_slice(&[0x05, 0x30, 0x03, 0x40, 0x00, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00]);
        let frame = append_checksum(&body);
        assert_eq!(frame.len(), 14);

        let mut framer = Framer::new();
        framer.extend(&frame);
        assert_eq!(framer.next_message().unwrap(), Some(frame));
    }

    #[test]
    fn leading_noise_is_skipped() {
        let frame = append_checksum(&[0xB0, 0x05, 0x30]);
        let mut framer = Framer::new();
        framer.extend(&[0x01, 0x7F, 0x23]);
        framer.extend(&frame);
        assert_eq!(framer.next_message().unwrap(), Some(frame));
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn pure_noise_is_dropped() {
        let mut framer = Framer::new();
        framer.extend(&[0x01, 0x02, 0x03]);
        assert_eq!(framer.next_message().unwrap(), None);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn split_across_chunks() {
        let frame = append_checksum(&[0xA0, 0x05, 0x40]);
        let mut framer = Framer::new();
        framer.extend(&frame[..2]);
        assert_eq!(framer.next_message().unwrap(), None);
        framer.extend(&frame[2..]);
        assert_eq!(framer.next_message().unwrap(), Some(frame));
    }

    #[test]
    fn checksum_failure_resyncs_to_following_message() {
        let mut bad = append_checksum(&[0xB0, 0x05, 0x30]);
        *bad.last_mut().unwrap() ^= 0x01;
        let good = append_checksum(&[0xA0, 0x07, 0x20]);

        let mut framer = Framer::new();
        framer.extend(&bad);
        framer.extend(&good);

        // The corrupt frame yields nothing; the good frame still parses.
        assert_eq!(framer.next_message().unwrap(), Some(good));
        assert_eq!(framer.next_message().unwrap(), None);
    }

    #[test]
    fn checksum_validation_can_be_disabled() {
        let mut bad = append_checksum(&[0xB0, 0x05, 0x30]);
        *bad.last_mut().unwrap() ^= 0x01;

        let mut framer = Framer::with_checksum_validation(false);
        framer.extend(&bad);
        assert_eq!(framer.next_message().unwrap(), Some(bad));
    }

    #[test]
    fn illegal_declared_length_is_hard_error() {
        let mut framer = Framer::new();
        framer.extend(&[0xE7, 0x00, 0x01]);
        assert!(framer.next_message().is_err());

        // After resync the framer keeps working.
        framer.resync();
        let frame = append_checksum(&[0x83]);
        framer.extend(&frame);
        assert_eq!(framer.next_message().unwrap(), Some(frame));
    }

    #[test]
    fn one_message_per_call() {
        let first = append_checksum(&[0x83]);
        let second = append_checksum(&[0x82]);
        let mut framer = Framer::new();
        framer.extend(&first);
        framer.extend(&second);

        assert_eq!(framer.next_message().unwrap(), Some(first));
        assert_eq!(framer.next_message().unwrap(), Some(second));
        assert_eq!(framer.next_message().unwrap(), None);
    }

    #[test]
    fn discard_partial_clears_buffer() {
        let mut framer = Framer::new();
        framer.extend(&[0xE7, 0x0E, 0x05]);
        framer.discard_partial();
        assert_eq!(framer.pending(), 0);
        assert_eq!(framer.next_message().unwrap(), None);
    }

    mod read_message_tests {
        use super::*;
        use locolib_test_harness::MockTransport;
        use std::time::Duration;

        #[tokio::test]
        async fn reads_one_message() {
            let frame = append_checksum(&[0x83]);
            let mut mock = MockTransport::new();
            mock.inject(&frame);

            let mut framer = Framer::new();
            let msg = read_message(&mut mock, &mut framer, Duration::from_millis(20))
                .await
                .unwrap();
            assert_eq!(msg, Some(frame));
        }

        #[tokio::test]
        async fn timeout_yields_no_message() {
            let mut mock = MockTransport::new();
            let mut framer = Framer::new();
            let msg = read_message(&mut mock, &mut framer, Duration::from_millis(10))
                .await
                .unwrap();
            assert_eq!(msg, None);
        }

        #[tokio::test]
        async fn queued_messages_come_one_per_call() {
            let first = append_checksum(&[0x83]);
            let second = append_checksum(&[0x82]);
            let mut both = first.clone();
            both.extend_from_slice(&second);

            let mut mock = MockTransport::new();
            mock.inject(&both);

            let mut framer = Framer::new();
            let timeout = Duration::from_millis(20);
            assert_eq!(
                read_message(&mut mock, &mut framer, timeout).await.unwrap(),
                Some(first)
            );
            assert_eq!(
                read_message(&mut mock, &mut framer, timeout).await.unwrap(),
                Some(second)
            );
            assert_eq!(
                read_message(&mut mock, &mut framer, timeout).await.unwrap(),
                None
            );
        }
    }
}
