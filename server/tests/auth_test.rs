//! Integration tests for login and the /api/auth/me endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use proposal_server::collab::registry::RoomRegistry;

/// Helper: start the server on a random port with seeded demo users
/// and return its base URL.
async fn start_test_server() -> String {
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

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_login_with_demo_credentials() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&serde_json::json!({
            "email": "alice@example.com",
            "password": "demo123",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    assert!(!body["access_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&serde_json::json!({
            "email": "alice@example.com",
            "password": "wrong",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_login_rejects_unknown_email() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&serde_json::json!({
            "email": "nobody@example.com",
            "password": "demo123",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_me_returns_profile() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&serde_json::json!({
            "email": "bob@example.com",
            "password": "demo123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let token = body["access_token"].as_str().unwrap().to_string();

    let resp = client
        .get(format!("{}/api/auth/me", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let me: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(me["name"], "Bob Finance");
    assert_eq!(me["email"], "bob@example.com");
    assert_eq!(me["role"], "finance");
}

#[tokio::test]
async fn test_me_requires_token() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/auth/me", base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}
