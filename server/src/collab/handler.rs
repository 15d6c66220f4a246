use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::collab::{actor, registry::DEFAULT_TAB};
use crate::state::AppState;

/// Query parameters for WebSocket connection.
/// Auth is via query param ?token=JWT; browsers cannot set headers on
/// WebSocket upgrades.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
    /// Tab the client opens on; defaults to the WBS view.
    pub tab: Option<String>,
}

/// WebSocket close codes:
/// 4001 = token expired
/// 4002 = token invalid
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /ws/proposals/{proposal_id}?token=JWT&tab=wbs
/// WebSocket upgrade endpoint. Authenticates via query parameter.
/// On auth failure, upgrades then immediately closes with appropriate
/// close code — rejection is never an in-band message.
/// On success, spawns an actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path(proposal_id): Path<String>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    // Validate JWT from query parameter
    let claims = jwt::validate_access_token(&state.jwt_secret, &params.token);

    match claims {
        Ok(claims) => {
            let tab = params.tab.unwrap_or_else(|| DEFAULT_TAB.to_string());

            // Resolve the display name from the DB so renames take
            // effect; fall back to the name stamped into the token.
            let display_name = lookup_display_name(&state, &claims.sub)
                .await
                .unwrap_or(claims.name);

            tracing::info!(
                user_id = %claims.sub,
                proposal_id = %proposal_id,
                tab = %tab,
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| {
                handle_authenticated(socket, state, proposal_id, display_name, tab)
            })
        }
        Err(err) => {
            // Determine close code based on error type
            let (close_code, reason) = match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    (CLOSE_TOKEN_EXPIRED, "Token expired")
                }
                _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
            };

            tracing::warn!(
                close_code = close_code,
                reason = reason,
                "WebSocket auth failed"
            );

            // Upgrade the connection, then immediately close with the error code
            ws.on_upgrade(move |mut socket| async move {
                let close_frame = CloseFrame {
                    code: close_code,
                    reason: reason.into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}

/// Handle an authenticated WebSocket connection by spawning the actor.
async fn handle_authenticated(
    socket: WebSocket,
    state: AppState,
    proposal_id: String,
    user_name: String,
    tab: String,
) {
    actor::run_connection(socket, state, proposal_id, user_name, tab).await;
}

async fn lookup_display_name(state: &AppState, user_id: &str) -> Option<String> {
    let db = state.db.clone();
    let uid = user_id.to_string();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        conn.query_row(
            "SELECT name FROM users WHERE id = ?1",
            rusqlite::params![uid],
            |row| row.get::<_, String>(0),
        )
        .ok()
    })
    .await
    .ok()
    .flatten()
}
