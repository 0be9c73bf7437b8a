//! The connection manager: one reader loop, one writer task, one idle
//! timer per TCP connection, shared in shape by the Gate and every Lobby
//! acceptor. Framing and dispatch are delegated to the `gate` and `domain`
//! crates; this module owns only socket I/O and the idle-timeout/teardown
//! mechanics described for the connection manager.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::codec::{FrameReader, FramingError, SendBuffer};
use domain::actor::TitleHandle;
use domain::inbound::parse_client_frame;
use gate::GateState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Connections that send nothing for this long are torn down without a
/// reply, matching the idle-timeout behaviour in the governing design.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

const READ_CHUNK: usize = 4096;

/// Drains `rx` into the socket's write half, coalescing whatever is queued
/// at the moment a write starts into a single buffer rather than issuing
/// one syscall per frame.
async fn writer_task(
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
) {
    let mut send_buf = SendBuffer::new();
    while let Some(frame) = rx.recv().await {
        send_buf.push(&frame);
        while let Ok(more) = rx.try_recv() {
            send_buf.push(&more);
        }
        if let Err(err) = write_half.write_all(send_buf.as_bytes()).await {
            tracing::debug!(error = %err, "connection write failed, dropping");
            return;
        }
        let written = send_buf.as_bytes().len();
        send_buf.consume(written);
    }
}

/// Runs one Lobby connection end to end: accepts bytes off the socket,
/// hands complete frames to the title actor, and tears the player down on
/// EOF, framing error, or idle timeout.
pub async fn run_lobby_connection(stream: TcpStream, peer: SocketAddr, title: TitleHandle) {
    let _ = stream.set_nodelay(true);
    let (mut read_half, write_half) = stream.into_split();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    tokio::spawn(writer_task(outbox_rx, write_half));

    let ip = match peer.ip() {
        std::net::IpAddr::V4(v4) => v4.octets(),
        std::net::IpAddr::V6(_) => [0, 0, 0, 0],
    };
    let Some(player) = title.connect(ip, outbox_tx).await else {
        tracing::warn!(%peer, "lobby title actor gone before connect completed");
        return;
    };

    let span = tracing::info_span!("lobby_conn", %peer, player);
    let _enter = span.enter();

    let mut framer = FrameReader::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let sleep = tokio::time::sleep(IDLE_TIMEOUT);
    tokio::pin!(sleep);

    let mut idle_timed_out = false;
    loop {
        tokio::select! {
            result = read_half.read(&mut buf) => {
                match result {
                    Ok(0) => break,
                    Ok(n) => {
                        framer.extend(&buf[..n]);
                        sleep.as_mut().reset(tokio::time::Instant::now() + IDLE_TIMEOUT);
                        if !drain_lobby_frames(&mut framer, &title, player) {
                            break;
                        }
                    }
                    Err(err) => {
                        if !is_benign_socket_error(&err) {
                            tracing::warn!(error = %err, "lobby socket error");
                        }
                        break;
                    }
                }
            }
            _ = &mut sleep => {
                idle_timed_out = true;
                break;
            }
        }
    }

    tracing::debug!(idle_timed_out, "lobby connection closing");
    title.disconnect(player, false);
}

/// Pulls every complete frame currently buffered and dispatches it. Returns
/// `false` if a framing error was hit, signalling the caller to tear the
/// connection down without attempting resynchronisation.
fn drain_lobby_frames(framer: &mut FrameReader, title: &TitleHandle, player: domain::entities::PlayerId) -> bool {
    loop {
        match framer.try_next_frame() {
            Ok(Some(body)) => match parse_client_frame(&body) {
                Ok(frame) => {
                    title.client_frame(player, frame.opcode, Bytes::copy_from_slice(frame.payload));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "malformed lobby frame, closing connection");
                    return false;
                }
            },
            Ok(None) => return true,
            Err(FramingError::TooLarge(len)) => {
                tracing::warn!(len, "oversized lobby frame, closing connection");
                return false;
            }
            Err(err) => {
                tracing::warn!(error = %err, "lobby framing error, closing connection");
                return false;
            }
        }
    }
}

/// Runs one Gate connection: a request/reply loop with no domain-graph
/// back-reference, since every Gate operation is a self-contained
/// persistence call. Kept alive across multiple requests on the same
/// socket, same idle timeout as the Lobby.
pub async fn run_gate_connection(mut stream: TcpStream, peer: SocketAddr, state: Arc<GateState>) {
    let _ = stream.set_nodelay(true);
    let span = tracing::info_span!("gate_conn", %peer);
    let _enter = span.enter();

    let mut framer = FrameReader::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let sleep = tokio::time::sleep(IDLE_TIMEOUT);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => break,
                    Ok(n) => {
                        framer.extend(&buf[..n]);
                        sleep.as_mut().reset(tokio::time::Instant::now() + IDLE_TIMEOUT);
                        match drain_gate_frames(&mut framer, &state, &mut stream).await {
                            Ok(()) => {}
                            Err(_) => break,
                        }
                    }
                    Err(err) => {
                        if !is_benign_socket_error(&err) {
                            tracing::warn!(error = %err, "gate socket error");
                        }
                        break;
                    }
                }
            }
            _ = &mut sleep => {
                tracing::debug!("gate connection idle timeout");
                break;
            }
        }
    }
}

async fn drain_gate_frames(
    framer: &mut FrameReader,
    state: &Arc<GateState>,
    stream: &mut TcpStream,
) -> Result<(), ()> {
    loop {
        let body = match framer.try_next_frame() {
            Ok(Some(body)) => body,
            Ok(None) => return Ok(()),
            Err(FramingError::TooLarge(len)) => {
                tracing::warn!(len, "oversized gate frame, closing connection");
                return Err(());
            }
            Err(err) => {
                tracing::warn!(error = %err, "gate framing error, closing connection");
                return Err(());
            }
        };
        let tokens = gate::protocol::tokenize(&body);
        let replies = gate::service::dispatch(state, &tokens).await;
        for (opcode, payload) in replies {
            let Ok(frame) = gate::protocol::encode_reply(opcode, &payload) else {
                tracing::warn!(opcode, "gate reply too large to encode, dropping");
                continue;
            };
            if stream.write_all(&frame).await.is_err() {
                return Err(());
            }
        }
    }
}

fn is_benign_socket_error(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
    )
}
