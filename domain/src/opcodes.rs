//! Client-request opcodes and server-reply/broadcast opcodes are modelled as
//! two entirely separate namespaces: several literal values coincide between
//! them (e.g. client `CHAT_LOBBY` and the server's `LOGIN_OK` are both
//! `0x11`), and conflating them into one enum would make that coincidence
//! look like a bug instead of the two-space protocol design it actually is.

/// Opcodes a connected client sends to the lobby server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ClientOpcode {
    Login = 0x01,
    Login2 = 0x02,
    SendLog = 0x03,
    EntrLobby = 0x04,
    Disconnect = 0x05,
    GetLobbies = 0x07,
    GetGames = 0x08,
    SelectGame = 0x09,
    Ping = 0x0A,
    Search = 0x0B,
    GetLicense = 0x0C,
    Reconnect = 0x0D,
    LaunchGameAck = 0x0E,
    GetTeams = 0x0F,
    RefreshPlayers = 0x10,
    ChatLobby = 0x11,
    SharedMemPlayer = 0x1B,
    SharedMemTeam = 0x20,
    LeaveTeam = 0x21,
    LaunchRequest = 0x22,
    ChatTeam = 0x23,
    CreateTeam = 0x24,
    JoinTeam = 0x25,
    SendCtcpMsg = 0x26,
    ExtraUserMemAck = 0x28,
    GetExtraUserMem = 0x29,
    RegistExtraUserMemStart = 0x2A,
    RegistExtraUserMemTransfer = 0x2B,
    RegistExtraUserMemEnd = 0x2C,
    LeaveLobby = 0x3C,
    JoinGroup = 0x3F,
    LaunchGame = 0x65,
    RefreshUsers = 0x67,
}

impl ClientOpcode {
    pub fn from_u16(raw: u16) -> Option<Self> {
        use ClientOpcode::*;
        Some(match raw {
            0x01 => Login,
            0x02 => Login2,
            0x03 => SendLog,
            0x04 => EntrLobby,
            0x05 => Disconnect,
            0x07 => GetLobbies,
            0x08 => GetGames,
            0x09 => SelectGame,
            0x0A => Ping,
            0x0B => Search,
            0x0C => GetLicense,
            0x0D => Reconnect,
            0x0E => LaunchGameAck,
            0x0F => GetTeams,
            0x10 => RefreshPlayers,
            0x11 => ChatLobby,
            0x1B => SharedMemPlayer,
            0x20 => SharedMemTeam,
            0x21 => LeaveTeam,
            0x22 => LaunchRequest,
            0x23 => ChatTeam,
            0x24 => CreateTeam,
            0x25 => JoinTeam,
            0x26 => SendCtcpMsg,
            0x28 => ExtraUserMemAck,
            0x29 => GetExtraUserMem,
            0x2A => RegistExtraUserMemStart,
            0x2B => RegistExtraUserMemTransfer,
            0x2C => RegistExtraUserMemEnd,
            0x3C => LeaveLobby,
            0x3F => JoinGroup,
            0x65 => LaunchGame,
            0x67 => RefreshUsers,
            _ => return None,
        })
    }
}

/// Opcodes the server sends back. A distinct namespace from [`ClientOpcode`]
/// by design — see the module doc.
pub mod server {
    pub const PING_REPLY: u16 = 0x00;
    pub const SEARCH_RESULT: u16 = 0x07;
    pub const SEND_LOG_ACK: u16 = 0x06;
    pub const LICENSE_REPLY: u16 = 0x0C;
    pub const MOTD: u16 = 0x0A;
    pub const RECONNECT_ACK: u16 = 0x0D;
    pub const DISCONNECT_NOTIFY: u16 = 0x16;
    pub const LOGIN_OK: u16 = 0x11;
    pub const JOIN_LOBBY_CONFIRM: u16 = 0x13;
    pub const LOBBY_LIST_ITEM: u16 = 0x18;
    pub const LOBBY_LIST_END: u16 = 0x19;
    pub const GAME_LIST_ITEM: u16 = 0x20;
    pub const GAME_LIST_END: u16 = 0x21;
    pub const GAME_SEL_ACK: u16 = 0x22;
    pub const TEAM_NAME_EXISTS: u16 = 0x03;
    pub const TEAM_CREATED: u16 = 0x28;
    pub const LOBBY_FULL: u16 = 0x05;
    pub const CHAT_LOBBY_MSG: u16 = 0x2D;
    pub const CTCP_MSG: u16 = 0x2E;
    pub const LEAVE_LOBBY_NOTIFY: u16 = 0x2C;
    pub const PLAYER_RECORD: u16 = 0x30;
    pub const PLAYER_LIST_END: u16 = 0x31;
    pub const TEAM_LIST_ITEM: u16 = 0x32;
    pub const TEAM_LIST_END: u16 = 0x33;
    pub const SHARED_MEM_TEAM: u16 = 0x34;
    pub const TEAM_DELETED: u16 = 0x3A;
    pub const TEAM_HOST_CHANGED: u16 = 0x3B;
    pub const LAUNCH_REQUEST_REPLY: u16 = 0x3D;
    pub const LAUNCH_GAME_REPLY: u16 = 0x3E;
    pub const SHARED_MEM_PLAYER: u16 = 0x42;
    pub const CHAT_TEAM_MSG: u16 = 0x43;
    pub const GET_EXTRAMEM_BEGIN: u16 = 0x50;
    pub const GET_EXTRAMEM_CHUNK: u16 = 0x51;
    pub const GET_EXTRAMEM_END: u16 = 0x52;
    pub const EXTRAMEM_ACK: u16 = 0x4F;
    pub const SEARCH_END: u16 = 0xC9;
    pub const DISCONNECT_ACK: u16 = 0xE3;
    pub const LOGIN2_EXTRA: u16 = 0xE1;
    pub const LEAVE_LOBBY_OK: u16 = 0xCB;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_opcode_is_none() {
        assert!(ClientOpcode::from_u16(0x9999).is_none());
    }

    #[test]
    fn known_opcode_round_trips() {
        assert_eq!(ClientOpcode::from_u16(0x04), Some(ClientOpcode::EntrLobby));
    }
}
