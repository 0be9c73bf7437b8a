//! The process supervisor: the one place that reads configuration, opens
//! the database, spawns every title actor, and binds every listening
//! socket. Binding happens for all nine ports before any of them starts
//! accepting, so a single misconfigured port fails the whole process
//! before a client could ever reach a half-started one.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use common::config::{Config, DEFAULT_CONFIG_PATH};
use common::title::{GameId, Title, GATE_PORT};
use domain::actor::{spawn_title_actor, TitleHandle};
use gate::service::{GateState, RunningServer};
use notify::NotificationSink;
use persistence::SqliteStore;
use tokio::net::TcpListener;

use crate::errors::SupervisorError;
use crate::net;

/// The single default lobby created for every title at startup. The
/// source config format has no per-title key for this, so every title
/// gets the one permanent room named below.
const DEFAULT_LOBBY_NAME: &str = "Lobby";

pub async fn run() -> Result<(), SupervisorError> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    run_with_config_path(&config_path).await
}

pub async fn run_with_config_path(config_path: &str) -> Result<(), SupervisorError> {
    common::logging::init_tracing();
    let _ = dotenvy::dotenv();

    let config = load_config(config_path)?;

    let store = Arc::new(connect_store(&config).await?);
    let notify = NotificationSink::new(config.discord_webhook().map(str::to_string));

    let mut title_handles: HashMap<GameId, TitleHandle> = HashMap::new();
    let mut running: HashMap<GameId, RunningServer> = HashMap::new();
    let mut title_listeners = Vec::new();

    for id in GameId::ALL {
        let title = Title::for_id(id);
        let addr: SocketAddr = ([0, 0, 0, 0], title.port).into();
        let listener = bind(addr).await?;

        let key = title_config_key(title);
        let server_name = config.server_name(&key, title.display_name);
        let motd = config.motd(&key, "");

        let handle = spawn_title_actor(
            title,
            server_name.clone(),
            motd,
            vec![DEFAULT_LOBBY_NAME],
            store.clone(),
            notify.clone(),
        );
        running.insert(
            id,
            RunningServer {
                server_name,
                local_ip: "127.0.0.1".to_string(),
                port: title.port,
            },
        );
        title_handles.insert(id, handle);
        title_listeners.push((title, listener));
    }

    let gate_addr: SocketAddr = ([0, 0, 0, 0], GATE_PORT).into();
    let gate_listener = bind(gate_addr).await?;
    let gate_state = Arc::new(GateState::new(store.clone(), running));

    for (title, listener) in title_listeners {
        let handle = title_handles
            .get(&title.id)
            .expect("every bound title has a spawned actor")
            .clone();
        tokio::spawn(run_lobby_accept_loop(title, listener, handle));
    }
    tokio::spawn(run_gate_accept_loop(gate_listener, gate_state));

    tracing::info!(gate_port = GATE_PORT, "iwango-server is up");
    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, exiting");
    Ok(())
}

fn load_config(path: &str) -> Result<Config, SupervisorError> {
    match Config::load(path) {
        Ok(config) => Ok(config),
        Err(common::config::ConfigError::Io { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            tracing::info!(path, "no config file found, running with defaults");
            Ok(Config::empty())
        }
        Err(err) => Err(err.into()),
    }
}

async fn connect_store(config: &Config) -> Result<SqliteStore, SupervisorError> {
    let store = SqliteStore::connect(config.database_path()).await?;
    store.run_migrations().await?;
    Ok(store)
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, SupervisorError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| SupervisorError::Bind { addr, source })
}

/// Maps a title to the config-key prefix used for its `*ServerName` /
/// `*MOTD` overrides. The flagship title has no game-specific prefix,
/// matching the original config's treatment of the default title.
fn title_config_key(title: &Title) -> String {
    if title.is_flagship {
        String::new()
    } else {
        title.display_name.split_whitespace().collect::<String>()
    }
}

async fn run_lobby_accept_loop(title: &'static Title, listener: TcpListener, handle: TitleHandle) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    net::run_lobby_connection(stream, peer, handle).await;
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, title = title.display_name, "lobby accept failed");
            }
        }
    }
}

async fn run_gate_accept_loop(listener: TcpListener, state: Arc<GateState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    net::run_gate_connection(stream, peer, state).await;
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "gate accept failed");
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
