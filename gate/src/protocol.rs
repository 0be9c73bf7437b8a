//! Gate frame shape: `len(2) | opcode(2) | ascii-payload`. Requests arrive
//! as a bare ASCII command line with no opcode field — the "opcode" slot
//! only exists on replies — so request parsing is just whitespace
//! tokenizing, and every reply goes through [`encode_reply`].

use bytes::BytesMut;
use common::codec::{encode_frame, FramingError};

/// Splits a request body into space-separated ASCII tokens. Gate traffic is
/// plain ASCII end to end (unlike the Lobby protocol, nothing here needs the
/// Shift-JIS/full-width bridge).
pub fn tokenize(body: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(body)
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Serialises one reply frame: `len(2) | opcode(2) | payload`.
pub fn encode_reply(opcode: u16, payload: &[u8]) -> Result<BytesMut, FramingError> {
    let mut body = Vec::with_capacity(2 + payload.len());
    body.extend_from_slice(&opcode.to_le_bytes());
    body.extend_from_slice(payload);
    encode_frame(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_on_whitespace() {
        assert_eq!(
            tokenize(b"HANDLE_ADD alice TITLE 0 BOB"),
            vec!["HANDLE_ADD", "alice", "TITLE", "0", "BOB"]
        );
    }

    #[test]
    fn reply_frame_layout() {
        let frame = encode_reply(0x3F3, b"1 BOB").unwrap();
        let len = u16::from_le_bytes([frame[0], frame[1]]) as usize;
        assert_eq!(len, 2 + 5);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 0x3F3);
        assert_eq!(&frame[4..], b"1 BOB");
    }
}
