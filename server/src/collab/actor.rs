use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::collab::protocol::{self, ClientMessage};
use crate::state::AppState;

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming messages, dispatches to the room
///
/// The mpsc channel allows any part of the system to send messages to
/// this client by cloning the sender held in the room registry.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    proposal_id: String,
    user_name: String,
    tab: String,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Admit to the room; this also broadcasts the fresh presence view,
    // including the initial snapshot to this connection's own queue.
    let conn_id = state.rooms.next_connection_id();
    state
        .rooms
        .admit(conn_id, &proposal_id, &user_name, &tab, tx.clone());

    tracing::info!(
        conn_id = conn_id,
        proposal_id = %proposal_id,
        user = %user_name,
        "WebSocket actor started"
    );

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            // Send ping
            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            // Wait for pong within timeout
            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    // Pong timeout or channel closed — close connection
                    tracing::warn!(conn_id = conn_id, "Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    match protocol::parse_client_message(&text) {
                        Some(ClientMessage::TabChange { tab }) => {
                            state.rooms.set_tab(conn_id, &tab);
                        }
                        Some(ClientMessage::Edit(edit)) => {
                            let payload = protocol::edit_frame(edit, &user_name);
                            state.rooms.broadcast(&proposal_id, &payload, Some(conn_id));
                        }
                        None => {
                            // Malformed frame — ignore, stay open
                            tracing::debug!(
                                conn_id = conn_id,
                                "Ignoring malformed frame: {}",
                                text.chars().take(100).collect::<String>()
                            );
                        }
                    }
                }
                Message::Binary(_) => {
                    // The protocol is JSON text; binary frames are ignored
                    tracing::debug!(conn_id = conn_id, "Ignoring binary frame");
                }
                Message::Pong(_) => {
                    // Pong received — notify the ping task
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        conn_id = conn_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    conn_id = conn_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::info!(conn_id = conn_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Remove from the room; cascades to room cleanup and a presence
    // rebroadcast to the remaining members.
    state.rooms.remove(conn_id);

    tracing::info!(
        conn_id = conn_id,
        proposal_id = %proposal_id,
        user = %user_name,
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
