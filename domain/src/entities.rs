//! Player / Lobby / Team / Title-Server: the runtime domain graph owned
//! entirely by a single title actor task (see [`crate::actor`]). No `Arc`,
//! `Mutex`, or reference-counted back-pointers: members reference each other
//! by id or by name, and the actor's own maps are the single source of
//! truth.

use std::collections::HashMap;

use bytes::Bytes;
use common::Title;
use tokio::sync::mpsc;

pub type PlayerId = u64;

pub const SHARED_MEM_LEN: usize = 30;
pub const MAX_EXTRA_MEM_LEN: usize = 0x2000;

/// One connected client. Lives from accept to disconnect; `outbox` is a
/// channel to that connection's writer task, so the actor never touches a
/// socket directly.
pub struct Player {
    pub id: PlayerId,
    pub name: Option<String>,
    pub ip: [u8; 4],
    pub shared_mem: [u8; SHARED_MEM_LEN],
    pub flags: u32,
    pub lobby: Option<String>,
    pub team: Option<String>,
    pub extra_mem_offset: usize,
    pub extra_mem_end: usize,
    pub extra_mem: Vec<u8>,
    pub disconnected: bool,
    pub outbox: mpsc::UnboundedSender<Bytes>,
}

impl Player {
    pub fn new(id: PlayerId, ip: [u8; 4], outbox: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            id,
            name: None,
            ip,
            shared_mem: [0u8; SHARED_MEM_LEN],
            flags: 0,
            lobby: None,
            team: None,
            extra_mem_offset: 0,
            extra_mem_end: 0,
            extra_mem: Vec::new(),
            disconnected: false,
            outbox,
        }
    }

    /// Enqueues a frame for this player; a closed channel (the connection
    /// already dropped) is silently ignored, matching the "player has a null
    /// connection" tolerance of the system this replaces.
    pub fn send_frame(&self, opcode: u16, payload: &[u8]) {
        let frame = crate::outbound::make_frame(opcode, payload);
        let _ = self.outbox.send(frame);
    }

    pub fn send_opcode(&self, opcode: u16) {
        self.send_frame(opcode, &[]);
    }
}

/// A match room inside a lobby.
pub struct Team {
    pub name: String,
    pub capacity: u32,
    pub host: PlayerId,
    pub shared_mem: Vec<u8>,
    pub members: Vec<PlayerId>,
    pub flags: u32,
}

impl Team {
    pub fn is_full(&self) -> bool {
        self.members.len() as u32 >= self.capacity
    }
}

/// A chat room; container of players and of teams.
pub struct Lobby {
    pub name: String,
    pub capacity: u32,
    pub flags: u32,
    pub shared_mem: Option<String>,
    pub permanent: bool,
    pub members: Vec<PlayerId>,
    pub teams: HashMap<String, Team>,
}

impl Lobby {
    pub fn new(name: impl Into<String>, capacity: u32, permanent: bool) -> Self {
        Self {
            name: name.into(),
            capacity,
            flags: 0,
            shared_mem: None,
            permanent,
            members: Vec::new(),
            teams: HashMap::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.members.len() as u32 >= self.capacity
    }

    pub fn has_member_named(&self, name: &str, players: &HashMap<PlayerId, Player>) -> bool {
        self.members
            .iter()
            .filter_map(|id| players.get(id))
            .any(|p| p.name.as_deref() == Some(name))
    }

    /// True if this lobby should be garbage-collected: non-permanent and
    /// empty.
    pub fn is_garbage(&self) -> bool {
        !self.permanent && self.members.is_empty()
    }
}

/// Per-title singleton holding the entire live domain graph for that title.
pub struct TitleState {
    pub title: &'static Title,
    pub server_name: String,
    pub motd: String,
    pub players: HashMap<PlayerId, Player>,
    pub lobbies: HashMap<String, Lobby>,
    pub next_player_id: PlayerId,
    /// Disabled in debug builds, matching the `#ifndef DEBUG` guard on the
    /// IP-uniqueness check this behaviour is grounded on.
    pub check_ip_uniqueness: bool,
}

impl TitleState {
    pub fn new(title: &'static Title, server_name: String, motd: String, default_lobbies: &[&str]) -> Self {
        let mut lobbies = HashMap::new();
        for name in default_lobbies {
            lobbies.insert((*name).to_string(), Lobby::new(*name, 64, true));
        }
        Self {
            title,
            server_name,
            motd,
            players: HashMap::new(),
            lobbies: HashMap::new(),
            next_player_id: 1,
            check_ip_uniqueness: !cfg!(debug_assertions),
        }
        .with_lobbies(lobbies)
    }

    fn with_lobbies(mut self, lobbies: HashMap<String, Lobby>) -> Self {
        self.lobbies = lobbies;
        self
    }

    pub fn allocate_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    pub fn find_player_by_name(&self, name: &str) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|(_, p)| p.name.as_deref() == Some(name))
            .map(|(id, _)| *id)
    }

    pub fn find_player_by_ip(&self, ip: [u8; 4]) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|(_, p)| p.ip == ip && p.name.is_some())
            .map(|(id, _)| *id)
    }
}
