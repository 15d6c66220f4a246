use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::state::AppState;

const STATUSES: &[&str] = &["draft", "in_review", "submitted"];

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub id: String,
    pub proposal_number: String,
    pub title: String,
    pub client_name: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub proposal_number: String,
    pub title: String,
    pub client_name: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProposalRequest {
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub status: Option<String>,
}

const COLUMNS: &str = "id, proposal_number, title, client_name, status, created_at, updated_at";

fn read_row(row: &rusqlite::Row<'_>) -> Result<ProposalResponse, rusqlite::Error> {
    Ok(ProposalResponse {
        id: row.get(0)?,
        proposal_number: row.get(1)?,
        title: row.get(2)?,
        client_name: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn validate_status(status: &str) -> Result<(), (StatusCode, String)> {
    if STATUSES.contains(&status) {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown proposal status: {}", status),
        ))
    }
}

/// GET /api/proposals — All proposals, newest first.
pub async fn list_proposals(
    State(state): State<AppState>,
    _claims: Claims,
) -> Result<Json<Vec<ProposalResponse>>, (StatusCode, String)> {
    let db = state.db.clone();

    let proposals = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM proposals ORDER BY created_at DESC",
                COLUMNS
            ))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Prepare: {}", e)))?;

        let proposals = stmt
            .query_map([], read_row)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Read: {}", e)))?;

        Ok::<_, (StatusCode, String)>(proposals)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(proposals))
}

/// POST /api/proposals
pub async fn create_proposal(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<CreateProposalRequest>,
) -> Result<(StatusCode, Json<ProposalResponse>), (StatusCode, String)> {
    if req.title.trim().is_empty() || req.proposal_number.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Proposal number and title are required".to_string(),
        ));
    }
    let status = req.status.unwrap_or_else(|| "draft".to_string());
    validate_status(&status)?;

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let proposal = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO proposals (id, proposal_number, title, client_name, status, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            rusqlite::params![id, req.proposal_number, req.title, req.client_name, status, user_id, now],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                (
                    StatusCode::BAD_REQUEST,
                    "Proposal number already exists".to_string(),
                )
            }
            e => (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert proposal: {}", e)),
        })?;

        Ok::<_, (StatusCode, String)>(ProposalResponse {
            id,
            proposal_number: req.proposal_number,
            title: req.title,
            client_name: req.client_name,
            status,
            created_at: now.clone(),
            updated_at: now,
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok((StatusCode::CREATED, Json(proposal)))
}

/// GET /api/proposals/{id}
pub async fn get_proposal(
    State(state): State<AppState>,
    _claims: Claims,
    Path(proposal_id): Path<String>,
) -> Result<Json<ProposalResponse>, (StatusCode, String)> {
    let db = state.db.clone();

    let proposal = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        conn.query_row(
            &format!("SELECT {} FROM proposals WHERE id = ?1", COLUMNS),
            [&proposal_id],
            read_row,
        )
        .map_err(|_| (StatusCode::NOT_FOUND, "Proposal not found".to_string()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(proposal))
}

/// PATCH /api/proposals/{id} — Partial update.
pub async fn update_proposal(
    State(state): State<AppState>,
    _claims: Claims,
    Path(proposal_id): Path<String>,
    Json(req): Json<UpdateProposalRequest>,
) -> Result<Json<ProposalResponse>, (StatusCode, String)> {
    if let Some(status) = &req.status {
        validate_status(status)?;
    }

    let db = state.db.clone();

    let proposal = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut proposal = conn
            .query_row(
                &format!("SELECT {} FROM proposals WHERE id = ?1", COLUMNS),
                [&proposal_id],
                read_row,
            )
            .map_err(|_| (StatusCode::NOT_FOUND, "Proposal not found".to_string()))?;

        if let Some(title) = req.title {
            proposal.title = title;
        }
        if let Some(client) = req.client_name {
            proposal.client_name = Some(client);
        }
        if let Some(status) = req.status {
            proposal.status = status;
        }
        proposal.updated_at = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE proposals SET title = ?1, client_name = ?2, status = ?3, updated_at = ?4 WHERE id = ?5",
            rusqlite::params![
                proposal.title,
                proposal.client_name,
                proposal.status,
                proposal.updated_at,
                proposal.id
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update proposal: {}", e)))?;

        Ok::<_, (StatusCode, String)>(proposal)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(proposal))
}
