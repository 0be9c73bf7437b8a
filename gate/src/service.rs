//! Gate request dispatch: the opcode-free ASCII command line goes in,
//! zero or more reply frames come out. Every handler is a pure function of
//! [`GateState`] plus the request tokens — there's no per-connection state
//! at this layer, unlike the Lobby's per-title actor.

use std::collections::HashMap;
use std::sync::Arc;

use common::{GameId, Title};
use persistence::HandleStore;

use crate::handles::{self, HandleError};
use crate::opcodes::reply;
use crate::synthetic::SyntheticAllocator;

/// Advertisement data for a currently-running title Lobby server, handed
/// back to clients by `REQUEST_FILTER` so they know where to connect next.
#[derive(Debug, Clone)]
pub struct RunningServer {
    pub server_name: String,
    pub local_ip: String,
    pub port: u16,
}

pub struct GateState {
    pub store: Arc<dyn HandleStore>,
    pub synth: SyntheticAllocator,
    pub running: HashMap<GameId, RunningServer>,
}

impl GateState {
    pub fn new(store: Arc<dyn HandleStore>, running: HashMap<GameId, RunningServer>) -> Self {
        Self {
            store,
            synth: SyntheticAllocator::new(),
            running,
        }
    }
}

/// Dispatches one request's tokens to the matching handler. Returns the
/// ordered list of reply frames to write back; an empty vec means nothing
/// is sent (shouldn't happen for any request this engine recognises, since
/// every path below replies with at least `ERROR1`).
pub async fn dispatch(state: &GateState, tokens: &[String]) -> Vec<(u16, Vec<u8>)> {
    match tokens.first().map(String::as_str) {
        Some("REQUEST_FILTER") => request_filter(state, tokens),
        Some("HANDLE_LIST_GET") => handle_list_get(state, tokens).await,
        Some("HANDLE_ADD") => handle_add(state, tokens).await,
        Some("HANDLE_REPLACE") => handle_replace(state, tokens).await,
        Some("HANDLE_DELETE") => handle_delete(state, tokens).await,
        _ => vec![(reply::ERROR1, Vec::new())],
    }
}

fn error1() -> Vec<(u16, Vec<u8>)> {
    vec![(reply::ERROR1, Vec::new())]
}

fn request_filter(state: &GateState, tokens: &[String]) -> Vec<(u16, Vec<u8>)> {
    let Some(token) = tokens.get(1) else {
        return error1();
    };
    let title = Title::from_token(token);
    let mut out = vec![(reply::BEGIN, Vec::new())];
    if let Some(running) = state.running.get(&title.id) {
        let payload = format!(
            "{} {} {} 1",
            running.server_name, running.local_ip, running.port
        );
        out.push((reply::SERVER, payload.into_bytes()));
    }
    out.push((reply::END, Vec::new()));
    out
}

async fn handle_list_get(state: &GateState, tokens: &[String]) -> Vec<(u16, Vec<u8>)> {
    let (Some(user), Some(token)) = (tokens.get(1), tokens.get(2)) else {
        return error1();
    };
    let title = Title::from_token(token);
    match handles::list_handles(state.store.as_ref(), &state.synth, title, user).await {
        Ok(list) => {
            let payload = list
                .iter()
                .enumerate()
                .map(|(i, h)| format!("{}{}", i + 1, h))
                .collect::<Vec<_>>()
                .join(" ");
            vec![(reply::HANDLE_LIST, payload.into_bytes())]
        }
        Err(err) => {
            tracing::error!(error = %err, "handle_list_get: persistence failure");
            error1()
        }
    }
}

async fn handle_add(state: &GateState, tokens: &[String]) -> Vec<(u16, Vec<u8>)> {
    let (Some(user), Some(token), Some(index), Some(name)) = (
        tokens.get(1),
        tokens.get(2),
        tokens.get(3).and_then(|s| s.parse::<i64>().ok()),
        tokens.get(4),
    ) else {
        return error1();
    };
    let title = Title::from_token(token);
    match handles::add_handle(state.store.as_ref(), title, user, index, name).await {
        Ok(()) => vec![(reply::HANDLE_ADDED, format!("1 {name}").into_bytes())],
        Err(HandleError::AlreadyExists) => vec![(reply::NAME_IN_USE1, Vec::new())],
        Err(HandleError::OwnHandleCollision) => vec![(reply::NAME_IN_USE2, Vec::new())],
        Err(HandleError::Persistence(err)) => {
            tracing::error!(error = %err, "handle_add: persistence failure");
            error1()
        }
    }
}

async fn handle_replace(state: &GateState, tokens: &[String]) -> Vec<(u16, Vec<u8>)> {
    let (Some(user), Some(token), Some(index), Some(name)) = (
        tokens.get(1),
        tokens.get(2),
        tokens.get(3).and_then(|s| s.parse::<i64>().ok()),
        tokens.get(4),
    ) else {
        return error1();
    };
    let title = Title::from_token(token);
    match handles::replace_handle(state.store.as_ref(), title, user, index, name).await {
        Ok(()) => vec![(reply::HANDLE_REPLACED, format!("1 {name}").into_bytes())],
        Err(HandleError::AlreadyExists) => vec![(reply::NAME_IN_USE1, Vec::new())],
        Err(HandleError::OwnHandleCollision) => vec![(reply::NAME_IN_USE2, Vec::new())],
        Err(HandleError::Persistence(err)) => {
            tracing::error!(error = %err, "handle_replace: persistence failure");
            error1()
        }
    }
}

async fn handle_delete(state: &GateState, tokens: &[String]) -> Vec<(u16, Vec<u8>)> {
    let (Some(user), Some(token), Some(index)) = (
        tokens.get(1),
        tokens.get(2),
        tokens.get(3).and_then(|s| s.parse::<i64>().ok()),
    ) else {
        return error1();
    };
    let title = Title::from_token(token);
    match handles::delete_handle(state.store.as_ref(), title, user, index).await {
        Ok(()) => vec![(reply::HANDLE_DELETED, Vec::new())],
        Err(err) => {
            tracing::error!(error = %err, "handle_delete: persistence failure");
            error1()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::SqliteStore;

    async fn state() -> GateState {
        let store = SqliteStore::connect_in_memory().await;
        GateState::new(Arc::new(store), HashMap::new())
    }

    #[tokio::test]
    async fn handle_uniqueness_scenario() {
        let state = state().await;
        let tokens: Vec<String> = "HANDLE_ADD alice S00001S0001010440110 0 BOB"
            .split_whitespace()
            .map(String::from)
            .collect();
        let replies = dispatch(&state, &tokens).await;
        assert_eq!(replies, vec![(reply::HANDLE_ADDED, b"1 BOB".to_vec())]);

        let tokens2: Vec<String> = "HANDLE_ADD carol S00001S0001010440110 0 BOB"
            .split_whitespace()
            .map(String::from)
            .collect();
        let replies2 = dispatch(&state, &tokens2).await;
        assert_eq!(replies2, vec![(reply::NAME_IN_USE1, Vec::new())]);
    }

    #[tokio::test]
    async fn handle_delete_shifts_indices_scenario() {
        let state = state().await;
        for (i, h) in ["A", "B", "C", "D"].iter().enumerate() {
            let line = format!("HANDLE_ADD alice TitleTok {i} {h}");
            dispatch(&state, &line.split_whitespace().map(String::from).collect::<Vec<_>>()).await;
        }
        let delete = "HANDLE_DELETE alice TitleTok 1";
        dispatch(&state, &delete.split_whitespace().map(String::from).collect::<Vec<_>>()).await;

        let list = "HANDLE_LIST_GET alice TitleTok";
        let replies = dispatch(&state, &list.split_whitespace().map(String::from).collect::<Vec<_>>()).await;
        assert_eq!(replies[0].0, reply::HANDLE_LIST);
        assert_eq!(String::from_utf8(replies[0].1.clone()).unwrap(), "1A 2C 3D");
    }

    #[tokio::test]
    async fn synthetic_user_gets_player_n() {
        let state = state().await;
        let tokens: Vec<String> = "HANDLE_LIST_GET dream T"
            .split_whitespace()
            .map(String::from)
            .collect();
        let replies = dispatch(&state, &tokens).await;
        assert_eq!(replies[0].0, reply::HANDLE_LIST);
        assert_eq!(String::from_utf8(replies[0].1.clone()).unwrap(), "1Player1");
    }

    #[tokio::test]
    async fn malformed_request_is_error1() {
        let state = state().await;
        let tokens: Vec<String> = vec!["HANDLE_ADD".to_string(), "alice".to_string()];
        let replies = dispatch(&state, &tokens).await;
        assert_eq!(replies, vec![(reply::ERROR1, Vec::new())]);
    }

    #[tokio::test]
    async fn request_filter_reports_running_lobby_server() {
        let mut running = HashMap::new();
        running.insert(
            GameId::Daytona,
            RunningServer {
                server_name: "Daytona USA".into(),
                local_ip: "127.0.0.1".into(),
                port: 9501,
            },
        );
        let store = SqliteStore::connect_in_memory().await;
        let state = GateState::new(Arc::new(store), running);
        let tokens: Vec<String> = vec!["REQUEST_FILTER".to_string(), "garbage".to_string()];
        let replies = dispatch(&state, &tokens).await;
        assert_eq!(replies[0].0, reply::BEGIN);
        assert_eq!(replies[1].0, reply::SERVER);
        assert_eq!(
            String::from_utf8(replies[1].1.clone()).unwrap(),
            "Daytona USA 127.0.0.1 9501 1"
        );
        assert_eq!(replies[2].0, reply::END);
    }
}
