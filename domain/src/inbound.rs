//! Parses the extended Lobby client-frame header. A [`common::codec::FrameReader`]
//! has already stripped the 16-bit length prefix; what's left is
//! `reserved(2) | seq(2) | reserved(2) | opcode(2) | payload`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InboundError {
    #[error("lobby frame body shorter than the 8-byte header")]
    Truncated,
}

pub struct ClientFrame<'a> {
    pub seq: u16,
    pub opcode: u16,
    pub payload: &'a [u8],
}

pub fn parse_client_frame(body: &[u8]) -> Result<ClientFrame<'_>, InboundError> {
    if body.len() < 8 {
        return Err(InboundError::Truncated);
    }
    let seq = u16::from_le_bytes([body[2], body[3]]);
    let opcode = u16::from_le_bytes([body[6], body[7]]);
    Ok(ClientFrame {
        seq,
        opcode,
        payload: &body[8..],
    })
}
