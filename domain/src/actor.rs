//! The title actor: one dedicated task per title that owns the entire
//! domain graph with no lock. Every connection talks to it exclusively by
//! sending a [`Command`] down an `mpsc` channel and, where a reply is
//! needed, awaiting a `oneshot`. This is the concurrency model §5 of the
//! governing design calls for: a single-threaded cooperative scheduler
//! realised as "one task, no lock" rather than "many tasks, shared lock".

use std::sync::Arc;

use bytes::Bytes;
use common::Title;
use persistence::HandleStore;
use tokio::sync::{mpsc, oneshot};

use crate::dispatcher;
use crate::entities::{Player, PlayerId, TitleState};

pub enum Command {
    Connect {
        ip: [u8; 4],
        outbox: mpsc::UnboundedSender<Bytes>,
        reply: oneshot::Sender<PlayerId>,
    },
    ClientFrame {
        player: PlayerId,
        opcode: u16,
        payload: Bytes,
    },
    /// The connection dropped (EOF, socket error, or idle timeout).
    /// `send_dc_packet` mirrors the upstream distinction between a
    /// server-initiated teardown (client told to disconnect first) and a
    /// connection that is simply gone.
    Disconnect {
        player: PlayerId,
        send_dc_packet: bool,
    },
}

/// A cheap, cloneable handle connections use to talk to a title's actor
/// task.
#[derive(Clone)]
pub struct TitleHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl TitleHandle {
    pub async fn connect(&self, ip: [u8; 4], outbox: mpsc::UnboundedSender<Bytes>) -> Option<PlayerId> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx.send(Command::Connect { ip, outbox, reply }).ok()?;
        reply_rx.await.ok()
    }

    pub fn client_frame(&self, player: PlayerId, opcode: u16, payload: Bytes) {
        let _ = self.tx.send(Command::ClientFrame {
            player,
            opcode,
            payload,
        });
    }

    pub fn disconnect(&self, player: PlayerId, send_dc_packet: bool) {
        let _ = self.tx.send(Command::Disconnect {
            player,
            send_dc_packet,
        });
    }
}

/// Spawns the title actor task and returns a handle to it.
pub fn spawn_title_actor(
    title: &'static Title,
    server_name: String,
    motd: String,
    default_lobbies: Vec<&'static str>,
    store: Arc<dyn HandleStore>,
    notify: notify::NotificationSink,
) -> TitleHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = TitleState::new(title, server_name, motd, &default_lobbies);
    tokio::spawn(run_actor(state, rx, store, notify));
    TitleHandle { tx }
}

async fn run_actor(
    mut state: TitleState,
    mut rx: mpsc::UnboundedReceiver<Command>,
    store: Arc<dyn HandleStore>,
    notify: notify::NotificationSink,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Connect { ip, outbox, reply } => {
                let id = state.allocate_player_id();
                state.players.insert(id, Player::new(id, ip, outbox));
                // Ignore a dropped receiver: the connection task may already
                // have gone away between sending Connect and us handling it.
                let _ = reply.send(id);
            }
            Command::ClientFrame {
                player,
                opcode,
                payload,
            } => {
                dispatcher::handle_client_frame(&mut state, &store, &notify, player, opcode, &payload)
                    .await;
            }
            Command::Disconnect {
                player,
                send_dc_packet,
            } => {
                dispatcher::disconnect_player(&mut state, player, send_dc_packet);
            }
        }
    }
}
