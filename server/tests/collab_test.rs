//! Integration tests for the realtime collaboration WebSocket:
//! auth close codes, presence snapshots, tab changes, and edit relay.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use proposal_server::collab::registry::RoomRegistry;

type WsRead = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Helper: start the server on a random port with seeded demo users
/// and return (base_url, addr).
async fn start_test_server() -> (String, SocketAddr) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = proposal_server::db::init_db(&data_dir).expect("Failed to init DB");
    {
        let conn = db.lock().expect("DB lock");
        proposal_server::db::seed::seed_demo_users(&conn).expect("Failed to seed users");
    }
    let jwt_secret = proposal_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = proposal_server::state::AppState {
        db,
        jwt_secret,
        token_expire_minutes: 480,
        rooms: Arc::new(RoomRegistry::new()),
    };

    let app = proposal_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr)
}

/// Log in with the given demo account and return the access token.
async fn login(base_url: &str, email: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&serde_json::json!({ "email": email, "password": "demo123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

/// Create a proposal and return its id.
async fn create_proposal(base_url: &str, token: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/proposals", base_url))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "proposal_number": "P-2001",
            "title": "Collab test proposal",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

/// Read frames until one matches the predicate, or panic on timeout.
async fn read_until(read: &mut WsRead, mut pred: impl FnMut(&serde_json::Value) -> bool) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            if pred(&value) {
                return value;
            }
        }
    }
}

#[tokio::test]
async fn test_invalid_token_closes_with_4002() {
    let (_base_url, addr) = start_test_server().await;

    let ws_url = format!("ws://{}/ws/proposals/some-proposal?token=garbage", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WebSocket handshake failed");
    let (_write, mut read) = ws_stream.split();

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected close within timeout");
    match msg {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), 4002);
        }
        other => panic!("Expected close frame with code 4002, got {:?}", other),
    }
}

#[tokio::test]
async fn test_presence_snapshot_on_connect() {
    let (base_url, addr) = start_test_server().await;
    let token = login(&base_url, "alice@example.com").await;
    let proposal_id = create_proposal(&base_url, &token).await;

    let ws_url = format!(
        "ws://{}/ws/proposals/{}?token={}&tab=wbs",
        addr, proposal_id, token
    );
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WebSocket handshake failed");
    let (_write, mut read) = ws_stream.split();

    let presence = read_until(&mut read, |v| v["type"] == "presence").await;
    let wbs_users = presence["presence"]["wbs"].as_array().unwrap();
    assert!(wbs_users.iter().any(|u| u == "Alice PM"));
}

#[tokio::test]
async fn test_presence_updates_when_peer_joins_and_leaves() {
    let (base_url, addr) = start_test_server().await;
    let alice_token = login(&base_url, "alice@example.com").await;
    let bob_token = login(&base_url, "bob@example.com").await;
    let proposal_id = create_proposal(&base_url, &alice_token).await;

    let (alice_ws, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws/proposals/{}?token={}&tab=wbs",
        addr, proposal_id, alice_token
    ))
    .await
    .expect("Alice handshake failed");
    let (_alice_write, mut alice_read) = alice_ws.split();
    read_until(&mut alice_read, |v| v["type"] == "presence").await;

    let (bob_ws, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws/proposals/{}?token={}&tab=pricing",
        addr, proposal_id, bob_token
    ))
    .await
    .expect("Bob handshake failed");
    let (mut bob_write, _bob_read) = bob_ws.split();

    // Alice sees Bob join under the pricing tab
    let presence = read_until(&mut alice_read, |v| {
        v["type"] == "presence" && v["presence"]["pricing"].is_array()
    })
    .await;
    let pricing_users = presence["presence"]["pricing"].as_array().unwrap();
    assert!(pricing_users.iter().any(|u| u == "Bob Finance"));
    assert!(presence["presence"]["wbs"]
        .as_array()
        .unwrap()
        .iter()
        .any(|u| u == "Alice PM"));

    // Bob disconnects; Alice gets a presence update without him
    bob_write.send(Message::Close(None)).await.unwrap();
    let presence = read_until(&mut alice_read, |v| {
        v["type"] == "presence" && v["presence"]["pricing"].is_null()
    })
    .await;
    assert!(presence["presence"]["wbs"]
        .as_array()
        .unwrap()
        .iter()
        .any(|u| u == "Alice PM"));
}

#[tokio::test]
async fn test_tab_change_moves_user_in_presence() {
    let (base_url, addr) = start_test_server().await;
    let alice_token = login(&base_url, "alice@example.com").await;
    let bob_token = login(&base_url, "bob@example.com").await;
    let proposal_id = create_proposal(&base_url, &alice_token).await;

    let (alice_ws, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws/proposals/{}?token={}&tab=wbs",
        addr, proposal_id, alice_token
    ))
    .await
    .expect("Alice handshake failed");
    let (_alice_write, mut alice_read) = alice_ws.split();

    let (bob_ws, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws/proposals/{}?token={}&tab=wbs",
        addr, proposal_id, bob_token
    ))
    .await
    .expect("Bob handshake failed");
    let (mut bob_write, _bob_read) = bob_ws.split();

    read_until(&mut alice_read, |v| {
        v["type"] == "presence"
            && v["presence"]["wbs"]
                .as_array()
                .map(|a| a.len() == 2)
                .unwrap_or(false)
    })
    .await;

    bob_write
        .send(Message::Text(
            serde_json::json!({ "type": "tab_change", "tab": "schedule" })
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

    let presence = read_until(&mut alice_read, |v| {
        v["type"] == "presence" && v["presence"]["schedule"].is_array()
    })
    .await;
    assert!(presence["presence"]["schedule"]
        .as_array()
        .unwrap()
        .iter()
        .any(|u| u == "Bob Finance"));
}

#[tokio::test]
async fn test_edit_relayed_with_server_stamped_author() {
    let (base_url, addr) = start_test_server().await;
    let alice_token = login(&base_url, "alice@example.com").await;
    let bob_token = login(&base_url, "bob@example.com").await;
    let proposal_id = create_proposal(&base_url, &alice_token).await;

    let (alice_ws, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws/proposals/{}?token={}",
        addr, proposal_id, alice_token
    ))
    .await
    .expect("Alice handshake failed");
    let (mut alice_write, mut alice_read) = alice_ws.split();

    let (bob_ws, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws/proposals/{}?token={}",
        addr, proposal_id, bob_token
    ))
    .await
    .expect("Bob handshake failed");
    let (_bob_write, mut bob_read) = bob_ws.split();

    // Wait until both are admitted
    read_until(&mut alice_read, |v| {
        v["type"] == "presence"
            && v["presence"]["wbs"]
                .as_array()
                .map(|a| a.len() == 2)
                .unwrap_or(false)
    })
    .await;
    read_until(&mut bob_read, |v| v["type"] == "presence").await;

    // Alice edits a cell.  The frame claims someone else wrote it;
    // the server stamps the real author.
    alice_write
        .send(Message::Text(
            serde_json::json!({
                "type": "wbs_update",
                "item_id": "item-1",
                "field": "description",
                "value": "Revised",
                "updated_by": "Mallory",
            })
            .to_string()
            .into(),
        ))
        .await
        .unwrap();

    let edit = read_until(&mut bob_read, |v| v["type"] == "wbs_update").await;
    assert_eq!(edit["item_id"], "item-1");
    assert_eq!(edit["value"], "Revised");
    assert_eq!(edit["updated_by"], "Alice PM");

    // The sender never receives its own edit back
    let echo = tokio::time::timeout(Duration::from_millis(500), alice_read.next()).await;
    assert!(echo.is_err(), "Sender should not receive its own edit");
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let (base_url, addr) = start_test_server().await;
    let alice_token = login(&base_url, "alice@example.com").await;
    let bob_token = login(&base_url, "bob@example.com").await;
    let proposal_id = create_proposal(&base_url, &alice_token).await;

    let (alice_ws, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws/proposals/{}?token={}",
        addr, proposal_id, alice_token
    ))
    .await
    .expect("Alice handshake failed");
    let (mut alice_write, mut alice_read) = alice_ws.split();

    let (bob_ws, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws/proposals/{}?token={}",
        addr, proposal_id, bob_token
    ))
    .await
    .expect("Bob handshake failed");
    let (_bob_write, mut bob_read) = bob_ws.split();

    read_until(&mut alice_read, |v| {
        v["type"] == "presence"
            && v["presence"]["wbs"]
                .as_array()
                .map(|a| a.len() == 2)
                .unwrap_or(false)
    })
    .await;
    read_until(&mut bob_read, |v| v["type"] == "presence").await;

    // Garbage, then a frame missing "type", then a valid edit
    alice_write
        .send(Message::Text("not json at all".to_string().into()))
        .await
        .unwrap();
    alice_write
        .send(Message::Text(
            serde_json::json!({ "field": "x" }).to_string().into(),
        ))
        .await
        .unwrap();
    alice_write
        .send(Message::Text(
            serde_json::json!({ "type": "pricing_update", "row_id": "r1" })
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

    // The connection survives and the valid edit still arrives
    let edit = read_until(&mut bob_read, |v| v["type"] == "pricing_update").await;
    assert_eq!(edit["row_id"], "r1");
    assert_eq!(edit["updated_by"], "Alice PM");
}
