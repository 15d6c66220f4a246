//! Integration tests for proposal, people, pricing, scope, schedule,
//! deliverable, and drawing CRUD.

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

/// Log in as Alice and return the access token.
async fn login(base_url: &str) -> String {
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
    body["access_token"].as_str().unwrap().to_string()
}

/// Create a proposal and return its id.
async fn create_proposal(base_url: &str, token: &str, number: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/proposals", base_url))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "proposal_number": number,
            "title": "CRUD test proposal",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_proposal_number_must_be_unique() {
    let base_url = start_test_server().await;
    let token = login(&base_url).await;
    create_proposal(&base_url, &token, "P-3001").await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/proposals", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "proposal_number": "P-3001",
            "title": "Duplicate",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_proposal_update_and_status_validation() {
    let base_url = start_test_server().await;
    let token = login(&base_url).await;
    let proposal_id = create_proposal(&base_url, &token, "P-3002").await;

    let client = reqwest::Client::new();
    let resp = client
        .patch(format!("{}/api/proposals/{}", base_url, proposal_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "status": "in_review", "title": "Renamed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "in_review");
    assert_eq!(body["title"], "Renamed");

    let resp = client
        .patch(format!("{}/api/proposals/{}", base_url, proposal_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "status": "bogus" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_people_crud() {
    let base_url = start_test_server().await;
    let token = login(&base_url).await;
    let proposal_id = create_proposal(&base_url, &token, "P-3003").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/proposals/{}/people", base_url, proposal_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "employee_name": "Dana Engineer",
            "job_role": "Structural Engineer",
            "team": "Structures",
            "hourly_rate": 120.0,
            "years_experience": 8,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let person: serde_json::Value = resp.json().await.unwrap();
    let person_id = person["id"].as_str().unwrap().to_string();

    // Empty name is rejected
    let resp = client
        .post(format!("{}/api/proposals/{}/people", base_url, proposal_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "employee_name": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .patch(format!(
            "{}/api/proposals/{}/people/{}",
            base_url, proposal_id, person_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "role_on_project": "Lead" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(updated["role_on_project"], "Lead");
    assert_eq!(updated["employee_name"], "Dana Engineer");

    let resp = client
        .delete(format!(
            "{}/api/proposals/{}/people/{}",
            base_url, proposal_id, person_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{}/api/proposals/{}/people", base_url, proposal_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let people: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert!(people.is_empty());
}

#[tokio::test]
async fn test_pricing_rate_autofills_from_person() {
    let base_url = start_test_server().await;
    let token = login(&base_url).await;
    let proposal_id = create_proposal(&base_url, &token, "P-3004").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/proposals/{}/people", base_url, proposal_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "employee_name": "Dana Engineer",
            "job_role": "Structural Engineer",
            "hourly_rate": 150.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let person: serde_json::Value = resp.json().await.unwrap();
    let person_id = person["id"].as_str().unwrap().to_string();

    // No rate given: the linked person's rate fills in
    let resp = client
        .post(format!("{}/api/proposals/{}/pricing", base_url, proposal_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "person_id": person_id,
            "hours_by_phase": { "design": 10.0, "construction": 6.0 },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let row: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(row["hourly_rate"], 150.0);
    assert_eq!(row["person_name"], "Dana Engineer");
    assert_eq!(row["total_hours"], 16.0);
    assert_eq!(row["total_cost"], 2400.0);

    // An explicit rate wins over the person's rate
    let resp = client
        .post(format!("{}/api/proposals/{}/pricing", base_url, proposal_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "person_id": person_id,
            "hourly_rate": 90.0,
            "hours_by_phase": { "design": 2.0 },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let row: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(row["hourly_rate"], 90.0);
    assert_eq!(row["total_cost"], 180.0);
}

#[tokio::test]
async fn test_scope_sections_ordered() {
    let base_url = start_test_server().await;
    let token = login(&base_url).await;
    let proposal_id = create_proposal(&base_url, &token, "P-3005").await;
    let client = reqwest::Client::new();

    for (name, idx) in [("Introduction", 2), ("Executive Summary", 1), ("Approach", 3)] {
        let resp = client
            .post(format!("{}/api/proposals/{}/scope", base_url, proposal_id))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "section_name": name,
                "content": "...",
                "order_index": idx,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let resp = client
        .get(format!("{}/api/proposals/{}/scope", base_url, proposal_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let sections: Vec<serde_json::Value> = resp.json().await.unwrap();
    let names: Vec<&str> = sections
        .iter()
        .map(|s| s["section_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Executive Summary", "Introduction", "Approach"]);
}

#[tokio::test]
async fn test_schedule_milestone_roundtrip() {
    let base_url = start_test_server().await;
    let token = login(&base_url).await;
    let proposal_id = create_proposal(&base_url, &token, "P-3006").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!(
            "{}/api/proposals/{}/schedule",
            base_url, proposal_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "task_name": "Design freeze",
            "start_date": "2026-03-01",
            "is_milestone": true,
            "phase": "design",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let item: serde_json::Value = resp.json().await.unwrap();
    let item_id = item["id"].as_str().unwrap().to_string();
    assert_eq!(item["is_milestone"], true);

    let resp = client
        .patch(format!(
            "{}/api/proposals/{}/schedule/{}",
            base_url, proposal_id, item_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "is_milestone": false, "end_date": "2026-03-15" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(updated["is_milestone"], false);
    assert_eq!(updated["end_date"], "2026-03-15");
}

#[tokio::test]
async fn test_deliverable_kind_validation() {
    let base_url = start_test_server().await;
    let token = login(&base_url).await;
    let proposal_id = create_proposal(&base_url, &token, "P-3007").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!(
            "{}/api/proposals/{}/deliverables",
            base_url, proposal_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Basis of design",
            "kind": "report",
            "status": "in_progress",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let deliverable: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(deliverable["kind"], "report");
    assert_eq!(deliverable["status"], "in_progress");

    let resp = client
        .post(format!(
            "{}/api/proposals/{}/deliverables",
            base_url, proposal_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Mystery",
            "kind": "hologram",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_drawing_crud_with_deliverable_link() {
    let base_url = start_test_server().await;
    let token = login(&base_url).await;
    let proposal_id = create_proposal(&base_url, &token, "P-3008").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!(
            "{}/api/proposals/{}/deliverables",
            base_url, proposal_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Drawing package",
            "kind": "drawing_package",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let deliverable: serde_json::Value = resp.json().await.unwrap();
    let deliverable_id = deliverable["id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!(
            "{}/api/proposals/{}/drawings",
            base_url, proposal_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "drawing_number": "S-101",
            "title": "Foundation plan",
            "discipline": "Structural",
            "format": "dwg",
            "deliverable_id": deliverable_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let drawing: serde_json::Value = resp.json().await.unwrap();
    let drawing_id = drawing["id"].as_str().unwrap().to_string();
    assert_eq!(drawing["format"], "dwg");
    assert_eq!(drawing["status"], "tbd");

    let resp = client
        .patch(format!(
            "{}/api/proposals/{}/drawings/{}",
            base_url, proposal_id, drawing_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "revision": "B", "status": "in_progress" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(updated["revision"], "B");
    assert_eq!(updated["status"], "in_progress");

    let resp = client
        .delete(format!(
            "{}/api/proposals/{}/drawings/{}",
            base_url, proposal_id, drawing_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
}
