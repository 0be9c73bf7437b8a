//! Length-prefixed framing shared by the Gate and Lobby wire protocols, plus
//! the coalescing send buffer used by both connection types.
//!
//! Both protocols share one on-wire shape: a 16-bit little-endian length
//! prefix covering everything that follows it. What differs is how the bytes
//! after the prefix are interpreted (Gate: opcode + ASCII payload; Lobby:
//! reserved + seq + reserved + opcode + payload). This module owns the
//! shared streaming-buffer/length-prefix mechanics; the Gate and Lobby crates
//! own their own header layouts on top of it.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Frames whose body is longer than this are a protocol violation; the
/// connection is torn down without attempting resynchronisation. The length
/// prefix is a `u16`, so the reachable maximum is `u16::MAX`; this ceiling
/// must stay strictly below that or no on-wire value could ever trip the
/// `len > MAX_FRAME_LEN` check below.
pub const MAX_FRAME_LEN: usize = 0xFFFE;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("frame length {0} exceeds the {MAX_FRAME_LEN} byte maximum")]
    TooLarge(usize),
    #[error("frame payload shorter than the minimum for its header")]
    Truncated,
}

/// Accumulates bytes read from a socket and yields complete length-prefixed
/// frames as they become available. A frame is `len(2) | body(len)`; `body`
/// is returned to the caller untouched — protocol-specific header parsing
/// happens one layer up.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: BytesMut,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Feed newly-read bytes into the buffer.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pull one complete frame's body out of the buffer, if one is ready.
    /// Partial frames are left in place for the next `extend`.
    pub fn try_next_frame(&mut self) -> Result<Option<BytesMut>, FramingError> {
        if self.buf.len() < 2 {
            return Ok(None);
        }
        let len = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(FramingError::TooLarge(len));
        }
        let total = len + 2;
        if self.buf.len() < total {
            return Ok(None);
        }
        let mut frame = self.buf.split_to(total);
        frame.advance(2);
        Ok(Some(frame))
    }
}

/// Serialises a complete length-prefixed frame: `len(2) | body`.
pub fn encode_frame(body: &[u8]) -> Result<BytesMut, FramingError> {
    if body.len() > MAX_FRAME_LEN {
        return Err(FramingError::TooLarge(body.len()));
    }
    let mut out = BytesMut::with_capacity(body.len() + 2);
    out.put_u16_le(body.len() as u16);
    out.put_slice(body);
    Ok(out)
}

/// A per-connection outbound byte queue that coalesces multiple pending
/// frames into a single buffer, exactly mirroring the fixed coalescing send
/// buffer of the system this replaces: a second `push` while a write is in
/// flight just appends, and bytes already written are shifted out by the
/// caller via `consume`.
#[derive(Debug, Default)]
pub struct SendBuffer {
    pending: BytesMut,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self {
            pending: BytesMut::new(),
        }
    }

    pub fn push(&mut self, frame: &[u8]) {
        self.pending.extend_from_slice(frame);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pending
    }

    /// Drop the first `n` bytes, which the caller has just written to the
    /// socket, shifting the remainder down.
    pub fn consume(&mut self, n: usize) {
        self.pending.advance(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_waits_for_partial_frames() {
        let mut reader = FrameReader::new();
        let frame = encode_frame(b"hello").unwrap();
        reader.extend(&frame[..3]);
        assert!(reader.try_next_frame().unwrap().is_none());
        reader.extend(&frame[3..]);
        let body = reader.try_next_frame().unwrap().unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[test]
    fn reader_yields_multiple_queued_frames() {
        let mut reader = FrameReader::new();
        let a = encode_frame(b"one").unwrap();
        let b = encode_frame(b"two").unwrap();
        reader.extend(&a);
        reader.extend(&b);
        assert_eq!(&reader.try_next_frame().unwrap().unwrap()[..], b"one");
        assert_eq!(&reader.try_next_frame().unwrap().unwrap()[..], b"two");
        assert!(reader.try_next_frame().unwrap().is_none());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut reader = FrameReader::new();
        let mut huge = BytesMut::new();
        huge.put_u16_le(u16::MAX);
        huge.put_slice(&[0xAB; 16]);
        reader.extend(&huge);
        assert!(matches!(
            reader.try_next_frame(),
            Err(FramingError::TooLarge(_))
        ));
    }

    #[test]
    fn round_trip_for_all_sizes_up_to_header_budget() {
        for len in [0usize, 1, 2, 255, 4096, MAX_FRAME_LEN - 2] {
            let payload = vec![0xAB; len];
            let frame = encode_frame(&payload).unwrap();
            let mut reader = FrameReader::new();
            reader.extend(&frame);
            let body = reader.try_next_frame().unwrap().unwrap();
            assert_eq!(&body[..], &payload[..]);
        }
    }

    #[test]
    fn send_buffer_coalesces_and_consumes() {
        let mut send = SendBuffer::new();
        send.push(b"abc");
        send.push(b"def");
        assert_eq!(send.as_bytes(), b"abcdef");
        send.consume(3);
        assert_eq!(send.as_bytes(), b"def");
    }
}
