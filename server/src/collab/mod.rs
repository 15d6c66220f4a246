//! Realtime collaboration layer: per-proposal rooms, tab presence,
//! and field-level edit broadcast over WebSockets.

pub mod actor;
pub mod handler;
pub mod protocol;
pub mod registry;

use tokio::sync::mpsc;

/// Process-unique identifier for one live WebSocket connection.
pub type ConnectionId = u64;

/// Sender half of a connection's outbound message queue.
/// Pushes are non-blocking; the writer task drains the queue into the
/// socket, so a stalled peer never delays the code that queued the send.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
