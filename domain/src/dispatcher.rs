//! The opcode -> handler table for the lobby protocol. Every handler runs to
//! completion before the actor looks at its next command, so nothing here
//! needs to worry about another handler interleaving its mutations.

use std::sync::Arc;

use common::text::{decode_wire_text, encode_wire_text};
use persistence::HandleStore;

use crate::entities::{PlayerId, TitleState, SHARED_MEM_LEN};
use crate::opcodes::{server, ClientOpcode};
use crate::outbound::{player_broadcast_record, player_descriptor};

const MAX_EXTRA_CHUNK: usize = 200;

fn tokenize(state: &TitleState, payload: &[u8]) -> Vec<String> {
    decode_wire_text(state.title, payload)
        .split_whitespace()
        .map(String::from)
        .collect()
}

fn encode(state: &TitleState, text: &str) -> Vec<u8> {
    encode_wire_text(state.title, text)
}

pub async fn handle_client_frame(
    state: &mut TitleState,
    store: &Arc<dyn HandleStore>,
    notify: &notify::NotificationSink,
    player: PlayerId,
    opcode: u16,
    payload: &[u8],
) {
    if !state.players.contains_key(&player) {
        return;
    }
    let Some(op) = ClientOpcode::from_u16(opcode) else {
        tracing::warn!(opcode = format!("{opcode:#x}"), "unknown lobby opcode");
        return;
    };

    // Tokenized once, up front: every handler below needs `state` mutably,
    // and token decoding only needs it shared, so the two borrows must not
    // overlap.
    let tokens = tokenize(state, payload);

    match op {
        ClientOpcode::Login => login(state, player, &tokens),
        ClientOpcode::Login2 => login2(state, player, &tokens),
        ClientOpcode::SendLog => {
            if let Some(p) = state.players.get(&player) {
                p.send_opcode(server::SEND_LOG_ACK);
            }
        }
        ClientOpcode::EntrLobby => entr_lobby(state, notify, player, &tokens).await,
        ClientOpcode::Disconnect => disconnect_command(state, player),
        ClientOpcode::GetLobbies => get_lobbies(state, player),
        ClientOpcode::GetGames => get_games(state, player),
        ClientOpcode::SelectGame => {
            if let Some(p) = state.players.get(&player) {
                p.send_opcode(server::GAME_SEL_ACK);
            }
        }
        ClientOpcode::Ping => {
            if let Some(p) = state.players.get(&player) {
                p.send_opcode(server::PING_REPLY);
            }
        }
        ClientOpcode::Search => search(state, player, &tokens),
        ClientOpcode::GetLicense => {
            let empty = encode(state, "");
            if let Some(p) = state.players.get(&player) {
                p.send_frame(server::LICENSE_REPLY, &empty);
            }
        }
        ClientOpcode::Reconnect => {
            if let Some(p) = state.players.get(&player) {
                p.send_opcode(server::RECONNECT_ACK);
            }
        }
        ClientOpcode::LaunchGameAck => {}
        ClientOpcode::GetTeams => get_teams(state, player),
        ClientOpcode::RefreshPlayers => refresh_players(state, player, &tokens),
        ClientOpcode::RefreshUsers => refresh_players(state, player, &[]),
        ClientOpcode::ChatLobby => chat_lobby(state, player, &tokens),
        ClientOpcode::SharedMemPlayer => shared_mem_player(state, player, payload),
        ClientOpcode::SharedMemTeam => shared_mem_team(state, player, &tokens),
        ClientOpcode::LeaveTeam => leave_team(state, player),
        ClientOpcode::LaunchRequest => launch_request(state, player),
        ClientOpcode::ChatTeam => chat_team(state, player, &tokens),
        ClientOpcode::CreateTeam => create_team(state, notify, player, &tokens).await,
        ClientOpcode::JoinTeam => join_team(state, player, &tokens),
        ClientOpcode::SendCtcpMsg => send_ctcp(state, player, &tokens),
        ClientOpcode::ExtraUserMemAck => {}
        ClientOpcode::GetExtraUserMem => {
            get_extra_user_mem(state, store, player, &tokens).await
        }
        ClientOpcode::RegistExtraUserMemStart => regist_start(state, player, payload),
        ClientOpcode::RegistExtraUserMemTransfer => {
            regist_transfer(state, store, player, payload).await
        }
        ClientOpcode::RegistExtraUserMemEnd => regist_end(state, player),
        ClientOpcode::LeaveLobby => leave_lobby(state, player),
        ClientOpcode::JoinGroup => {
            tracing::debug!(player, "join-group opcode received, no handler modelled");
        }
        ClientOpcode::LaunchGame => launch_game(state, player),
    }
}

/// Sets the player's handle, disconnecting any existing player in this
/// title holding the same handle or (when enabled) the same source IP
/// first, without broadcasting that disconnect's cancel notice.
fn login(state: &mut TitleState, player: PlayerId, tokens: &[String]) {
    let Some(handle) = tokens.first() else {
        return;
    };
    let ip = state.players.get(&player).map(|p| p.ip);

    if let Some(existing) = state.find_player_by_name(handle) {
        if existing != player {
            suppress_and_disconnect(state, existing);
        }
    }
    if state.check_ip_uniqueness {
        if let (Some(ip), Some(existing)) = (ip, ip.and_then(|ip| state.find_player_by_ip(ip))) {
            if existing != player {
                suppress_and_disconnect(state, existing);
            }
        }
    }

    if let Some(p) = state.players.get_mut(&player) {
        p.name = Some(handle.clone());
    }
    if let Some(p) = state.players.get(&player) {
        p.send_frame(server::LOGIN_OK, &encode(state, &now_timestamp()));
    }
}

fn now_timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

/// Clears `name` before tearing the player down so its teardown does not
/// broadcast a cancel notice for a handle that is about to belong to
/// someone else.
fn suppress_and_disconnect(state: &mut TitleState, player: PlayerId) {
    if let Some(p) = state.players.get_mut(&player) {
        p.name = None;
    }
    disconnect_player(state, player, true);
}

fn login2(state: &mut TitleState, player: PlayerId, _tokens: &[String]) {
    let Some(p) = state.players.get(&player) else {
        return;
    };
    p.send_frame(server::LICENSE_REPLY, &encode(state, ""));
    p.send_frame(server::MOTD, &encode(state, &state.motd));
    p.send_opcode(server::LOGIN2_EXTRA);
}

async fn entr_lobby(
    state: &mut TitleState,
    notify: &notify::NotificationSink,
    player: PlayerId,
    tokens: &[String],
) {
    let Some(name) = tokens.first() else { return };
    let capacity: u32 = tokens.get(1).and_then(|s| s.parse().ok()).unwrap_or(64);

    if !state.lobbies.contains_key(name) {
        state
            .lobbies
            .insert(name.clone(), crate::entities::Lobby::new(name.clone(), capacity, false));
    }

    let Some(lobby) = state.lobbies.get_mut(name) else {
        return;
    };
    if lobby.is_full() {
        if let Some(p) = state.players.get(&player) {
            p.send_opcode(server::LOBBY_FULL);
        }
        return;
    }
    lobby.members.push(player);
    if let Some(p) = state.players.get_mut(&player) {
        p.lobby = Some(name.clone());
    }

    let player_name = state
        .players
        .get(&player)
        .and_then(|p| p.name.clone())
        .unwrap_or_default();

    if let Some(p) = state.players.get(&player) {
        let payload = format!("{} {}", encode_str(state, name), encode_str(state, &player_name));
        p.send_frame(server::JOIN_LOBBY_CONFIRM, payload.as_bytes());
    }

    broadcast_new_member(state, name, player);

    let member_names: Vec<String> = state.lobbies[name]
        .members
        .iter()
        .filter_map(|id| state.players.get(id))
        .filter_map(|p| p.name.clone())
        .collect();
    notify
        .lobby_joined(state.title.id, &player_name, name, &member_names)
        .await;
}

/// Encodes `s` for the wire using the title's text bridge, returned as a
/// `String` for easy inclusion in an ASCII token stream (the full-width
/// bridge never produces bytes that aren't representable as text here,
/// since the wire remains Shift-JIS throughout).
fn encode_str(state: &TitleState, s: &str) -> String {
    String::from_utf8_lossy(&encode(state, s)).into_owned()
}

fn broadcast_new_member(state: &TitleState, lobby_name: &str, new_player: PlayerId) {
    let Some(lobby) = state.lobbies.get(lobby_name) else {
        return;
    };
    let Some(new_p) = state.players.get(&new_player) else {
        return;
    };
    let is_host = false; // lobby membership has no host concept, only teams do
    let descriptor = player_descriptor(new_p, Some(lobby_name), None, is_host, state.title.display_name);
    let record = player_broadcast_record(&descriptor, &new_p.shared_mem, new_p.ip);
    for &member in &lobby.members {
        if member == new_player {
            continue;
        }
        if let Some(p) = state.players.get(&member) {
            p.send_frame(server::PLAYER_RECORD, &record);
        }
    }
}

fn leave_lobby(state: &mut TitleState, player: PlayerId) {
    let Some(lobby_name) = state.players.get(&player).and_then(|p| p.lobby.clone()) else {
        return;
    };
    remove_from_lobby(state, player, &lobby_name);
    if let Some(p) = state.players.get_mut(&player) {
        p.lobby = None;
    }
}

fn remove_from_lobby(state: &mut TitleState, player: PlayerId, lobby_name: &str) {
    let player_name = state.players.get(&player).and_then(|p| p.name.clone());
    let Some(lobby) = state.lobbies.get_mut(lobby_name) else {
        return;
    };
    lobby.members.retain(|&id| id != player);

    if let Some(p) = state.players.get(&player) {
        p.send_opcode(server::LEAVE_LOBBY_OK);
    }
    if let Some(name) = &player_name {
        let payload = encode(state, name);
        if let Some(lobby) = state.lobbies.get(lobby_name) {
            for &member in &lobby.members {
                if let Some(p) = state.players.get(&member) {
                    p.send_frame(server::LEAVE_LOBBY_NOTIFY, &payload);
                }
            }
        }
    }
    maybe_gc_lobby(state, lobby_name);
}

fn maybe_gc_lobby(state: &mut TitleState, lobby_name: &str) {
    if state.lobbies.get(lobby_name).is_some_and(|l| l.is_garbage()) {
        state.lobbies.remove(lobby_name);
    }
}

fn get_lobbies(state: &TitleState, player: PlayerId) {
    let Some(p) = state.players.get(&player) else {
        return;
    };
    for lobby in state.lobbies.values() {
        let payload = format!(
            "{} {} {}",
            encode_str(state, &lobby.name),
            lobby.members.len(),
            lobby.capacity
        );
        p.send_frame(server::LOBBY_LIST_ITEM, payload.as_bytes());
    }
    p.send_opcode(server::LOBBY_LIST_END);
}

fn get_games(state: &TitleState, player: PlayerId) {
    let Some(p) = state.players.get(&player) else {
        return;
    };
    let payload = format!(
        "{} {} {}",
        encode_str(state, &state.server_name),
        "127.0.0.1",
        state.title.port
    );
    p.send_frame(server::GAME_LIST_ITEM, payload.as_bytes());
    p.send_opcode(server::GAME_LIST_END);
}

fn get_teams(state: &TitleState, player: PlayerId) {
    let Some(p) = state.players.get(&player) else {
        return;
    };
    let Some(lobby_name) = state.players.get(&player).and_then(|p| p.lobby.clone()) else {
        p.send_opcode(server::TEAM_LIST_END);
        return;
    };
    let Some(lobby) = state.lobbies.get(&lobby_name) else {
        p.send_opcode(server::TEAM_LIST_END);
        return;
    };
    for team in lobby.teams.values() {
        let host_name = state
            .players
            .get(&team.host)
            .and_then(|h| h.name.clone())
            .unwrap_or_default();
        let payload = format!(
            "{} {} {}",
            encode_str(state, &team.name),
            encode_str(state, &host_name),
            team.members.len()
        );
        p.send_frame(server::TEAM_LIST_ITEM, payload.as_bytes());
    }
    p.send_opcode(server::TEAM_LIST_END);
}

fn refresh_players(state: &TitleState, player: PlayerId, tokens: &[String]) {
    let Some(p) = state.players.get(&player) else {
        return;
    };
    let Some(lobby_name) = state.players.get(&player).and_then(|p| p.lobby.clone()) else {
        p.send_opcode(server::PLAYER_LIST_END);
        return;
    };
    let Some(lobby) = state.lobbies.get(&lobby_name) else {
        p.send_opcode(server::PLAYER_LIST_END);
        return;
    };

    let filter_name = tokens.first();
    for &member in &lobby.members {
        let Some(mp) = state.players.get(&member) else {
            continue;
        };
        if let Some(filter) = filter_name {
            if mp.name.as_deref() != Some(filter.as_str()) {
                continue;
            }
        }
        let is_host = mp
            .team
            .as_ref()
            .and_then(|t| lobby.teams.get(t))
            .map(|t| t.host == member)
            .unwrap_or(false);
        let descriptor = player_descriptor(
            mp,
            Some(&lobby_name),
            mp.team.as_deref(),
            is_host,
            state.title.display_name,
        );
        let record = player_broadcast_record(&descriptor, &mp.shared_mem, mp.ip);
        p.send_frame(server::PLAYER_RECORD, &record);
    }
    p.send_opcode(server::PLAYER_LIST_END);
}

fn chat_lobby(state: &TitleState, player: PlayerId, tokens: &[String]) {
    let Some(lobby_name) = state.players.get(&player).and_then(|p| p.lobby.clone()) else {
        return;
    };
    let Some(message) = tokens.last() else { return };
    let from = state
        .players
        .get(&player)
        .and_then(|p| p.name.clone())
        .unwrap_or_default();
    let payload = format!("{} {}", encode_str(state, &from), encode_str(state, message));
    if let Some(lobby) = state.lobbies.get(&lobby_name) {
        for &member in &lobby.members {
            if let Some(p) = state.players.get(&member) {
                p.send_frame(server::CHAT_LOBBY_MSG, payload.as_bytes());
            }
        }
    }
}

fn chat_team(state: &TitleState, player: PlayerId, tokens: &[String]) {
    let Some((lobby_name, team_name)) = current_team(state, player) else {
        return;
    };
    let Some(message) = tokens.first() else { return };
    let from = state
        .players
        .get(&player)
        .and_then(|p| p.name.clone())
        .unwrap_or_default();
    let payload = format!("{} {}", encode_str(state, &from), encode_str(state, message));
    if let Some(team) = state.lobbies.get(&lobby_name).and_then(|l| l.teams.get(&team_name)) {
        for &member in &team.members {
            if let Some(p) = state.players.get(&member) {
                p.send_frame(server::CHAT_TEAM_MSG, payload.as_bytes());
            }
        }
    }
}

fn send_ctcp(state: &TitleState, player: PlayerId, tokens: &[String]) {
    let (Some(target), Some(body)) = (tokens.first(), tokens.get(2..).map(|s| s.join(" "))) else {
        return;
    };
    let from = state
        .players
        .get(&player)
        .and_then(|p| p.name.clone())
        .unwrap_or_default();
    let Some(target_id) = state.find_player_by_name(target) else {
        return;
    };
    if let Some(p) = state.players.get(&target_id) {
        let payload = format!("{} {}", encode_str(state, &from), encode_str(state, &body));
        p.send_frame(server::CTCP_MSG, payload.as_bytes());
    }
}

fn shared_mem_player(state: &mut TitleState, player: PlayerId, payload: &[u8]) {
    if payload.len() != SHARED_MEM_LEN {
        tracing::warn!(len = payload.len(), "invalid player shared-mem size, ignored");
        return;
    }
    let Some(p) = state.players.get_mut(&player) else {
        return;
    };
    p.shared_mem.copy_from_slice(payload);

    let Some((lobby_name, team_name)) = current_team(state, player) else {
        return;
    };
    fan_out_shared_mem_player(state, &lobby_name, &team_name, player);
}

fn fan_out_shared_mem_player(state: &TitleState, lobby_name: &str, team_name: &str, player: PlayerId) {
    let Some(owner) = state.players.get(&player) else {
        return;
    };
    let owner_name = owner.name.clone().unwrap_or_default();
    let mem = owner.shared_mem;
    let owner_name_bytes = encode(state, &owner_name);
    let mut payload = Vec::with_capacity(1 + owner_name_bytes.len() + mem.len());
    payload.push(owner_name_bytes.len() as u8);
    payload.extend_from_slice(&owner_name_bytes);
    payload.extend_from_slice(&mem);

    let Some(team) = state.lobbies.get(lobby_name).and_then(|l| l.teams.get(team_name)) else {
        return;
    };
    for &member in &team.members {
        if let Some(p) = state.players.get(&member) {
            p.send_frame(server::SHARED_MEM_PLAYER, &payload);
        }
    }
}

fn shared_mem_team(state: &mut TitleState, player: PlayerId, tokens: &[String]) {
    let Some(team_name) = tokens.first().cloned() else {
        return;
    };
    let Some(blob) = tokens.get(1) else { return };
    let Some(lobby_name) = state.players.get(&player).and_then(|p| p.lobby.clone()) else {
        return;
    };
    let encoded = encode(state, blob);

    let members = {
        let Some(lobby) = state.lobbies.get_mut(&lobby_name) else {
            return;
        };
        let Some(team) = lobby.teams.get_mut(&team_name) else {
            return;
        };
        team.shared_mem = encoded.clone();
        team.members.clone()
    };
    let mut payload = encode(state, &team_name);
    payload.push(b' ');
    payload.extend_from_slice(&encoded);
    for member in members {
        if let Some(p) = state.players.get(&member) {
            p.send_frame(server::SHARED_MEM_TEAM, &payload);
        }
    }
}

fn current_team(state: &TitleState, player: PlayerId) -> Option<(String, String)> {
    let p = state.players.get(&player)?;
    Some((p.lobby.clone()?, p.team.clone()?))
}

async fn create_team(
    state: &mut TitleState,
    notify: &notify::NotificationSink,
    player: PlayerId,
    tokens: &[String],
) {
    let Some(lobby_name) = state.players.get(&player).and_then(|p| p.lobby.clone()) else {
        return;
    };
    let (Some(capacity), Some(team_name)) = (
        tokens.first().and_then(|s| s.parse::<u32>().ok()),
        tokens.get(1).cloned(),
    ) else {
        return;
    };

    let Some(lobby) = state.lobbies.get_mut(&lobby_name) else {
        return;
    };
    if lobby.teams.contains_key(&team_name) {
        if let Some(p) = state.players.get(&player) {
            p.send_opcode(server::TEAM_NAME_EXISTS);
        }
        return;
    }
    lobby.teams.insert(
        team_name.clone(),
        crate::entities::Team {
            name: team_name.clone(),
            capacity,
            host: player,
            shared_mem: Vec::new(),
            members: vec![player],
            flags: 0,
        },
    );
    if let Some(p) = state.players.get_mut(&player) {
        p.team = Some(team_name.clone());
    }

    let creator_name = state
        .players
        .get(&player)
        .and_then(|p| p.name.clone())
        .unwrap_or_default();
    let payload = format!(
        "{} {} {} 0 {}",
        encode_str(state, &team_name),
        encode_str(state, &creator_name),
        capacity,
        encode_str(state, state.title.display_name)
    );
    let member_names: Vec<String> = state
        .lobbies
        .get(&lobby_name)
        .map(|l| {
            l.members
                .iter()
                .filter_map(|id| state.players.get(id))
                .filter_map(|p| p.name.clone())
                .collect()
        })
        .unwrap_or_default();
    if let Some(lobby) = state.lobbies.get(&lobby_name) {
        for &member in &lobby.members {
            if let Some(p) = state.players.get(&member) {
                p.send_frame(server::TEAM_CREATED, payload.as_bytes());
            }
        }
    }
    notify
        .game_created(state.title.id, &creator_name, &team_name, &member_names)
        .await;
}

fn join_team(state: &mut TitleState, player: PlayerId, tokens: &[String]) {
    let Some(team_name) = tokens.first().cloned() else {
        return;
    };
    let Some(lobby_name) = state.players.get(&player).and_then(|p| p.lobby.clone()) else {
        return;
    };
    let Some(lobby) = state.lobbies.get_mut(&lobby_name) else {
        return;
    };
    let Some(team) = lobby.teams.get_mut(&team_name) else {
        tracing::warn!(team = team_name, "joinTeam: team not found");
        return;
    };
    if team.is_full() {
        // Team join-full is silently refused, per the error taxonomy.
        return;
    }
    team.members.push(player);
    if let Some(p) = state.players.get_mut(&player) {
        p.team = Some(team_name);
    }
}

fn leave_team(state: &mut TitleState, player: PlayerId) {
    let Some((lobby_name, team_name)) = current_team(state, player) else {
        return;
    };
    remove_player_from_team(state, player, &lobby_name, &team_name);
    if let Some(p) = state.players.get_mut(&player) {
        p.team = None;
    }
}

/// Removes `player` from the named team, handling host promotion (if the
/// host left and members remain) or team deletion (if the team is now
/// empty), broadcasting the right notice to every lobby member in either
/// case.
fn remove_player_from_team(state: &mut TitleState, player: PlayerId, lobby_name: &str, team_name: &str) {
    let player_name = state.players.get(&player).and_then(|p| p.name.clone());
    let Some(lobby) = state.lobbies.get_mut(lobby_name) else {
        return;
    };
    let Some(team) = lobby.teams.get_mut(team_name) else {
        return;
    };
    team.members.retain(|&id| id != player);
    let was_host = team.host == player;

    if team.members.is_empty() {
        lobby.teams.remove(team_name);
        let payload = encode(state, team_name);
        if let Some(lobby) = state.lobbies.get(lobby_name) {
            for &member in &lobby.members {
                if let Some(p) = state.players.get(&member) {
                    p.send_frame(server::TEAM_DELETED, &payload);
                }
            }
        }
        return;
    }

    if was_host {
        let new_host = team.members[0];
        team.host = new_host;
        if let Some(name) = player_name {
            let payload = format!("{} {}", encode_str(state, team_name), encode_str(state, &name));
            if let Some(lobby) = state.lobbies.get(lobby_name) {
                for &member in &lobby.members {
                    if let Some(p) = state.players.get(&member) {
                        p.send_frame(server::TEAM_HOST_CHANGED, payload.as_bytes());
                    }
                }
            }
        }
    }
}

fn search(state: &TitleState, player: PlayerId, tokens: &[String]) {
    let Some(p) = state.players.get(&player) else {
        return;
    };
    let Some(name) = tokens.first() else { return };
    let target = state.find_player_by_name(name);
    let lobby_part = target
        .and_then(|id| state.players.get(&id))
        .and_then(|p| p.lobby.clone())
        .map(|l| format!("!{}", encode_str(state, &l)))
        .unwrap_or_else(|| "#".to_string());
    let payload = format!(
        "{} !{} {}",
        encode_str(state, name),
        encode_str(state, &state.server_name),
        lobby_part
    );
    p.send_frame(server::SEARCH_RESULT, payload.as_bytes());
    p.send_frame(server::SEARCH_END, b"1");
}

async fn get_extra_user_mem(
    state: &TitleState,
    store: &Arc<dyn HandleStore>,
    player: PlayerId,
    tokens: &[String],
) {
    let Some(p) = state.players.get(&player) else {
        return;
    };
    let (Some(target_name), Some(offset), Some(len)) = (
        tokens.first(),
        tokens.get(1).and_then(|s| s.parse::<usize>().ok()),
        tokens.get(2).and_then(|s| s.parse::<usize>().ok()),
    ) else {
        return;
    };
    let Some(target_id) = state.find_player_by_name(target_name) else {
        tracing::warn!(target = target_name, "getExtraMem: user not found");
        return;
    };
    let blob = if let Some(target_player) = state.players.get(&target_id) {
        if target_player.extra_mem.len() >= offset + len {
            target_player.extra_mem.clone()
        } else {
            store
                .get_blob(state.title.id, target_name)
                .await
                .unwrap_or_default()
        }
    } else {
        return;
    };

    p.send_opcode(server::GET_EXTRAMEM_BEGIN);
    let mut remaining = len;
    let mut cursor = offset;
    let mut idx: u16 = 0;
    while remaining > 0 && cursor < blob.len() {
        let chunk_len = remaining.min(MAX_EXTRA_CHUNK).min(blob.len() - cursor);
        let mut chunk = Vec::with_capacity(2 + chunk_len);
        chunk.extend_from_slice(&idx.to_le_bytes());
        chunk.extend_from_slice(&blob[cursor..cursor + chunk_len]);
        p.send_frame(server::GET_EXTRAMEM_CHUNK, &chunk);
        remaining -= chunk_len;
        cursor += chunk_len;
        idx = idx.wrapping_add(1);
    }
    p.send_opcode(server::GET_EXTRAMEM_END);
}

fn regist_start(state: &mut TitleState, player: PlayerId, payload: &[u8]) {
    if payload.len() < 8 {
        return;
    }
    let offset = u32::from_le_bytes(payload[0..4].try_into().unwrap()) as usize;
    let length = u32::from_le_bytes(payload[4..8].try_into().unwrap()) as usize;
    if length == 0 || offset + length > crate::entities::MAX_EXTRA_MEM_LEN {
        return;
    }
    let Some(p) = state.players.get_mut(&player) else {
        return;
    };
    p.extra_mem_offset = offset;
    p.extra_mem_end = offset + length;
    if p.extra_mem_end > p.extra_mem.len() {
        p.extra_mem.resize(p.extra_mem_end, 0);
    }
    p.send_opcode(server::EXTRAMEM_ACK);
}

async fn regist_transfer(state: &mut TitleState, store: &Arc<dyn HandleStore>, player: PlayerId, payload: &[u8]) {
    let (name, offset, size) = {
        let Some(p) = state.players.get_mut(&player) else {
            return;
        };
        if p.extra_mem_end == 0 {
            return;
        }
        let size = payload.len().min(p.extra_mem_end - p.extra_mem_offset);
        p.extra_mem[p.extra_mem_offset..p.extra_mem_offset + size].copy_from_slice(&payload[..size]);
        let offset = p.extra_mem_offset;
        p.extra_mem_offset += size;
        if p.extra_mem_offset >= p.extra_mem_end {
            p.extra_mem_end = 0;
        }
        (p.name.clone(), offset, size)
    };
    if let Some(name) = name {
        let _ = store.put_blob(state.title.id, &name, offset, &payload[..size]).await;
    }
    if let Some(p) = state.players.get(&player) {
        p.send_opcode(server::EXTRAMEM_ACK);
    }
}

fn regist_end(state: &mut TitleState, player: PlayerId) {
    let Some(p) = state.players.get_mut(&player) else {
        return;
    };
    p.extra_mem_end = 0;
    p.send_opcode(server::EXTRAMEM_ACK);
}

fn launch_request(state: &TitleState, player: PlayerId) {
    let Some((lobby_name, team_name)) = current_team(state, player) else {
        return;
    };
    let Some(team) = state.lobbies.get(&lobby_name).and_then(|l| l.teams.get(&team_name)) else {
        return;
    };
    let payload = format!("{} {}", state.server_name, state.title.port);
    for &member in &team.members {
        if let Some(p) = state.players.get(&member) {
            p.send_frame(server::LAUNCH_REQUEST_REPLY, payload.as_bytes());
        }
    }
}

fn launch_game(state: &TitleState, player: PlayerId) {
    let Some(p) = state.players.get(&player) else {
        return;
    };
    let Some((lobby_name, team_name)) = current_team(state, player) else {
        p.send_frame(server::LAUNCH_GAME_REPLY, b"0");
        return;
    };
    let Some(team) = state.lobbies.get(&lobby_name).and_then(|l| l.teams.get(&team_name)) else {
        p.send_frame(server::LAUNCH_GAME_REPLY, b"0");
        return;
    };
    let mut parts = vec![team.members.len().to_string()];
    for &member in &team.members {
        if let Some(mp) = state.players.get(&member) {
            let star = if member == team.host { "*" } else { "" };
            let name = mp.name.as_deref().unwrap_or("");
            parts.push(format!("{star}{name}"));
            parts.push(format!(
                "{}.{}.{}.{}",
                mp.ip[0], mp.ip[1], mp.ip[2], mp.ip[3]
            ));
        }
    }
    p.send_frame(server::LAUNCH_GAME_REPLY, parts.join(" ").as_bytes());
}

fn disconnect_command(state: &mut TitleState, player: PlayerId) {
    if let Some(p) = state.players.get(&player) {
        p.send_opcode(server::DISCONNECT_ACK);
        p.send_opcode(server::DISCONNECT_NOTIFY);
    }
    disconnect_player(state, player, false);
}

/// Tears a player down: unlinks it from its team, then its lobby, then the
/// title-server's player set, in that fixed order, and is idempotent (a
/// one-shot `disconnected` flag guards repeat calls).
pub fn disconnect_player(state: &mut TitleState, player: PlayerId, send_dc_packet: bool) {
    let Some(p) = state.players.get(&player) else {
        return;
    };
    if p.disconnected {
        return;
    }
    if send_dc_packet {
        p.send_opcode(server::DISCONNECT_NOTIFY);
    }
    if let Some(p) = state.players.get_mut(&player) {
        p.disconnected = true;
    }

    if let Some((lobby_name, team_name)) = current_team(state, player) {
        remove_player_from_team(state, player, &lobby_name, &team_name);
    }
    if let Some(lobby_name) = state.players.get(&player).and_then(|p| p.lobby.clone()) {
        remove_from_lobby(state, player, &lobby_name);
    }
    state.players.remove(&player);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Player;
    use bytes::Bytes;
    use common::{GameId, Title};
    use tokio::sync::mpsc;

    fn title() -> &'static Title {
        Title::for_id(GameId::Daytona)
    }

    fn new_state() -> TitleState {
        TitleState::new(title(), "Test Server".into(), "welcome".into(), &["Main"])
    }

    fn add_player(state: &mut TitleState, ip: [u8; 4]) -> (PlayerId, mpsc::UnboundedReceiver<Bytes>) {
        let id = state.allocate_player_id();
        let (tx, rx) = mpsc::unbounded_channel();
        state.players.insert(id, Player::new(id, ip, tx));
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> Vec<(u16, Vec<u8>)> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let opcode = u16::from_le_bytes([frame[2], frame[3]]);
            out.push((opcode, frame[4..].to_vec()));
        }
        out
    }

    #[test]
    fn login_sets_handle_and_replies() {
        let mut state = new_state();
        let (id, mut rx) = add_player(&mut state, [1, 2, 3, 4]);
        login(&mut state, id, &["alice".to_string()]);
        assert_eq!(state.players[&id].name.as_deref(), Some("alice"));
        let frames = drain(&mut rx);
        assert_eq!(frames[0].0, server::LOGIN_OK);
    }

    #[test]
    fn login_collision_disconnects_existing_without_cancel_broadcast() {
        let mut state = new_state();
        let (first, _rx1) = add_player(&mut state, [1, 1, 1, 1]);
        login(&mut state, first, &["bob".to_string()]);
        let (second, _rx2) = add_player(&mut state, [2, 2, 2, 2]);
        login(&mut state, second, &["bob".to_string()]);
        assert!(!state.players.contains_key(&first));
        assert_eq!(state.players[&second].name.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn ephemeral_lobby_gc_removes_empty_non_default_lobby() {
        let mut state = new_state();
        let notify = notify::NotificationSink::disabled();
        let (p1, _r1) = add_player(&mut state, [1, 1, 1, 1]);
        login(&mut state, p1, &["P1".to_string()]);
        entr_lobby(&mut state, &notify, p1, &["Test".to_string(), "4".to_string()]).await;
        let (p2, _r2) = add_player(&mut state, [2, 2, 2, 2]);
        login(&mut state, p2, &["P2".to_string()]);
        entr_lobby(&mut state, &notify, p2, &["Test".to_string(), "4".to_string()]).await;

        assert!(state.lobbies.contains_key("Test"));
        leave_lobby(&mut state, p1);
        assert!(state.lobbies.contains_key("Test"));
        leave_lobby(&mut state, p2);
        assert!(!state.lobbies.contains_key("Test"));
    }

    #[tokio::test]
    async fn team_host_promotion_on_host_departure() {
        let mut state = new_state();
        let notify = notify::NotificationSink::disabled();
        let (p1, _r1) = add_player(&mut state, [1, 1, 1, 1]);
        login(&mut state, p1, &["P1".to_string()]);
        entr_lobby(&mut state, &notify, p1, &["Main".to_string(), "8".to_string()]).await;
        let (p2, _r2) = add_player(&mut state, [2, 2, 2, 2]);
        login(&mut state, p2, &["P2".to_string()]);
        entr_lobby(&mut state, &notify, p2, &["Main".to_string(), "8".to_string()]).await;

        create_team(&mut state, &notify, p1, &["4".to_string(), "T".to_string()]).await;
        join_team(&mut state, p2, &["T".to_string()]);
        leave_team(&mut state, p1);

        let team = &state.lobbies["Main"].teams["T"];
        assert_eq!(team.host, p2);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut state = new_state();
        let (id, _rx) = add_player(&mut state, [1, 1, 1, 1]);
        login(&mut state, id, &["solo".to_string()]);
        disconnect_player(&mut state, id, false);
        assert!(!state.players.contains_key(&id));
        // Second call on an id no longer present is a clean no-op.
        disconnect_player(&mut state, id, false);
    }

    #[tokio::test]
    async fn cross_title_isolation_is_a_property_of_separate_actors() {
        // Two independent TitleState graphs never share player maps, so a
        // duplicate handle across titles cannot collide by construction.
        let mut a = new_state();
        let mut b = TitleState::new(Title::for_id(GameId::Tetris), "Test Server".into(), "welcome".into(), &[]);
        let (pa, _ra) = add_player(&mut a, [1, 1, 1, 1]);
        let (pb, _rb) = add_player(&mut b, [1, 1, 1, 1]);
        login(&mut a, pa, &["ZZZ".to_string()]);
        login(&mut b, pb, &["ZZZ".to_string()]);
        assert!(a.find_player_by_name("ZZZ").is_some());
        assert!(b.find_player_by_name("ZZZ").is_some());
    }
}
