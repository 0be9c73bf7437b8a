//! Helpers for building outbound Lobby frames and the fixed-layout player
//! broadcast record used by `PLAYER_RECORD` (opcode `0x30`).
//!
//! Outbound frames use the simple two-field header (`len(2) | opcode(2) |
//! payload`), not the extended four-field header client requests arrive
//! with (see [`crate::inbound`]) — the two directions are asymmetric on the
//! wire, matching the system this one replaces.

use bytes::{BufMut, Bytes, BytesMut};

use crate::entities::{Player, SHARED_MEM_LEN};

pub fn make_frame(opcode: u16, payload: &[u8]) -> Bytes {
    let body_len = payload.len() + 2;
    let mut out = BytesMut::with_capacity(body_len + 2);
    out.put_u16_le(body_len as u16);
    out.put_u16_le(opcode);
    out.put_slice(payload);
    out.freeze()
}

/// Builds the fixed broadcast record for a player: a one-byte length
/// prefix, the ASCII descriptor string, one byte of `0x01`, the 30-byte
/// shared memory, and the player's 4-byte IPv4 address.
pub fn player_broadcast_record(
    descriptor: &str,
    shared_mem: &[u8; SHARED_MEM_LEN],
    ip: [u8; 4],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + descriptor.len() + 1 + SHARED_MEM_LEN + 4);
    out.push(descriptor.len() as u8);
    out.extend_from_slice(descriptor.as_bytes());
    out.push(1);
    out.extend_from_slice(shared_mem);
    out.extend_from_slice(&ip);
    out
}

/// Builds the `<lobby-or-#> <*?name> <flags> <*team-or-#> *<title>`
/// descriptor string used by [`player_broadcast_record`].
pub fn player_descriptor(
    player: &Player,
    lobby_name: Option<&str>,
    team_name: Option<&str>,
    is_host: bool,
    title_display_name: &str,
) -> String {
    let lobby_part = lobby_name.unwrap_or("#");
    let name = player.name.as_deref().unwrap_or("");
    let name_part = if is_host {
        format!("*{name}")
    } else {
        name.to_string()
    };
    let team_part = match team_name {
        Some(t) => format!("*{t}"),
        None => "#".to_string(),
    };
    format!(
        "{lobby_part} {name_part} {flags} {team_part} *{title_display_name}",
        flags = player.flags
    )
}
