use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::resources::proposal_exists;
use crate::state::AppState;

const KINDS: &[&str] = &["report", "model", "specification", "drawing_package", "other"];
const STATUSES: &[&str] = &["tbd", "in_progress", "complete"];

#[derive(Debug, Serialize, Deserialize)]
pub struct DeliverableResponse {
    pub id: String,
    pub proposal_id: String,
    pub wbs_id: Option<String>,
    pub deliverable_ref: Option<String>,
    pub title: String,
    pub kind: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub responsible_party: Option<String>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeliverableRequest {
    pub wbs_id: Option<String>,
    pub deliverable_ref: Option<String>,
    pub title: String,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub responsible_party: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeliverableRequest {
    pub wbs_id: Option<String>,
    pub deliverable_ref: Option<String>,
    pub title: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub responsible_party: Option<String>,
    pub status: Option<String>,
}

const COLUMNS: &str = "id, proposal_id, wbs_id, deliverable_ref, title, kind, description, \
                       due_date, responsible_party, status";

fn read_row(row: &rusqlite::Row<'_>) -> Result<DeliverableResponse, rusqlite::Error> {
    Ok(DeliverableResponse {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        wbs_id: row.get(2)?,
        deliverable_ref: row.get(3)?,
        title: row.get(4)?,
        kind: row.get(5)?,
        description: row.get(6)?,
        due_date: row.get(7)?,
        responsible_party: row.get(8)?,
        status: row.get(9)?,
    })
}

fn validate_enum(
    value: &str,
    allowed: &[&str],
    field: &str,
) -> Result<(), (StatusCode, String)> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown {}: {}", field, value),
        ))
    }
}

/// GET /api/proposals/{proposal_id}/deliverables
pub async fn list_deliverables(
    State(state): State<AppState>,
    _claims: Claims,
    Path(proposal_id): Path<String>,
) -> Result<Json<Vec<DeliverableResponse>>, (StatusCode, String)> {
    let db = state.db.clone();

    let deliverables = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM deliverables WHERE proposal_id = ?1 ORDER BY deliverable_ref, title",
                COLUMNS
            ))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Prepare: {}", e)))?;

        let deliverables = stmt
            .query_map([&proposal_id], read_row)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Read: {}", e)))?;

        Ok::<_, (StatusCode, String)>(deliverables)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(deliverables))
}

/// POST /api/proposals/{proposal_id}/deliverables
pub async fn create_deliverable(
    State(state): State<AppState>,
    claims: Claims,
    Path(proposal_id): Path<String>,
    Json(req): Json<CreateDeliverableRequest>,
) -> Result<(StatusCode, Json<DeliverableResponse>), (StatusCode, String)> {
    if req.title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Title cannot be empty".to_string()));
    }
    let kind = req.kind.unwrap_or_else(|| "other".to_string());
    let status = req.status.unwrap_or_else(|| "tbd".to_string());
    validate_enum(&kind, KINDS, "deliverable kind")?;
    validate_enum(&status, STATUSES, "deliverable status")?;

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let deliverable = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        if !proposal_exists(&conn, &proposal_id) {
            return Err((StatusCode::NOT_FOUND, "Proposal not found".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO deliverables (id, proposal_id, wbs_id, deliverable_ref, title, kind,
             description, due_date, responsible_party, status, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                id,
                proposal_id,
                req.wbs_id,
                req.deliverable_ref,
                req.title,
                kind,
                req.description,
                req.due_date,
                req.responsible_party,
                status,
                user_id,
                now
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert deliverable: {}", e)))?;

        Ok::<_, (StatusCode, String)>(DeliverableResponse {
            id,
            proposal_id,
            wbs_id: req.wbs_id,
            deliverable_ref: req.deliverable_ref,
            title: req.title,
            kind,
            description: req.description,
            due_date: req.due_date,
            responsible_party: req.responsible_party,
            status,
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok((StatusCode::CREATED, Json(deliverable)))
}

/// PATCH /api/proposals/{proposal_id}/deliverables/{deliverable_id}
pub async fn update_deliverable(
    State(state): State<AppState>,
    claims: Claims,
    Path((proposal_id, deliverable_id)): Path<(String, String)>,
    Json(req): Json<UpdateDeliverableRequest>,
) -> Result<Json<DeliverableResponse>, (StatusCode, String)> {
    if let Some(kind) = &req.kind {
        validate_enum(kind, KINDS, "deliverable kind")?;
    }
    if let Some(status) = &req.status {
        validate_enum(status, STATUSES, "deliverable status")?;
    }

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let deliverable = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut deliverable = conn
            .query_row(
                &format!(
                    "SELECT {} FROM deliverables WHERE id = ?1 AND proposal_id = ?2",
                    COLUMNS
                ),
                rusqlite::params![deliverable_id, proposal_id],
                read_row,
            )
            .map_err(|_| (StatusCode::NOT_FOUND, "Deliverable not found".to_string()))?;

        if let Some(wbs_id) = req.wbs_id {
            deliverable.wbs_id = Some(wbs_id);
        }
        if let Some(r) = req.deliverable_ref {
            deliverable.deliverable_ref = Some(r);
        }
        if let Some(title) = req.title {
            deliverable.title = title;
        }
        if let Some(kind) = req.kind {
            deliverable.kind = kind;
        }
        if let Some(desc) = req.description {
            deliverable.description = Some(desc);
        }
        if let Some(date) = req.due_date {
            deliverable.due_date = Some(date);
        }
        if let Some(party) = req.responsible_party {
            deliverable.responsible_party = Some(party);
        }
        if let Some(status) = req.status {
            deliverable.status = status;
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE deliverables SET wbs_id = ?1, deliverable_ref = ?2, title = ?3, kind = ?4,
             description = ?5, due_date = ?6, responsible_party = ?7, status = ?8,
             updated_by = ?9, updated_at = ?10 WHERE id = ?11",
            rusqlite::params![
                deliverable.wbs_id,
                deliverable.deliverable_ref,
                deliverable.title,
                deliverable.kind,
                deliverable.description,
                deliverable.due_date,
                deliverable.responsible_party,
                deliverable.status,
                user_id,
                now,
                deliverable.id
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update deliverable: {}", e)))?;

        Ok::<_, (StatusCode, String)>(deliverable)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(deliverable))
}

/// DELETE /api/proposals/{proposal_id}/deliverables/{deliverable_id}
pub async fn delete_deliverable(
    State(state): State<AppState>,
    _claims: Claims,
    Path((proposal_id, deliverable_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let rows = conn
            .execute(
                "DELETE FROM deliverables WHERE id = ?1 AND proposal_id = ?2",
                rusqlite::params![deliverable_id, proposal_id],
            )
            .map_err(|e| {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Delete deliverable: {}", e))
            })?;

        if rows == 0 {
            return Err((StatusCode::NOT_FOUND, "Deliverable not found".to_string()));
        }
        Ok::<_, (StatusCode, String)>(())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(StatusCode::NO_CONTENT)
}
