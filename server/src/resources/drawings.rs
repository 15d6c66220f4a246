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

const FORMATS: &[&str] = &["pdf", "dwg", "revit", "other"];
const STATUSES: &[&str] = &["tbd", "in_progress", "complete"];

#[derive(Debug, Serialize, Deserialize)]
pub struct DrawingResponse {
    pub id: String,
    pub proposal_id: String,
    pub wbs_id: Option<String>,
    pub deliverable_id: Option<String>,
    pub drawing_number: Option<String>,
    pub title: String,
    pub discipline: Option<String>,
    pub scale: Option<String>,
    pub format: String,
    pub due_date: Option<String>,
    pub responsible_party: Option<String>,
    pub revision: Option<String>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDrawingRequest {
    pub wbs_id: Option<String>,
    pub deliverable_id: Option<String>,
    pub drawing_number: Option<String>,
    pub title: String,
    pub discipline: Option<String>,
    pub scale: Option<String>,
    pub format: Option<String>,
    pub due_date: Option<String>,
    pub responsible_party: Option<String>,
    pub revision: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDrawingRequest {
    pub wbs_id: Option<String>,
    pub deliverable_id: Option<String>,
    pub drawing_number: Option<String>,
    pub title: Option<String>,
    pub discipline: Option<String>,
    pub scale: Option<String>,
    pub format: Option<String>,
    pub due_date: Option<String>,
    pub responsible_party: Option<String>,
    pub revision: Option<String>,
    pub status: Option<String>,
}

const COLUMNS: &str = "id, proposal_id, wbs_id, deliverable_id, drawing_number, title, \
                       discipline, scale, format, due_date, responsible_party, revision, status";

fn read_row(row: &rusqlite::Row<'_>) -> Result<DrawingResponse, rusqlite::Error> {
    Ok(DrawingResponse {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        wbs_id: row.get(2)?,
        deliverable_id: row.get(3)?,
        drawing_number: row.get(4)?,
        title: row.get(5)?,
        discipline: row.get(6)?,
        scale: row.get(7)?,
        format: row.get(8)?,
        due_date: row.get(9)?,
        responsible_party: row.get(10)?,
        revision: row.get(11)?,
        status: row.get(12)?,
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

/// GET /api/proposals/{proposal_id}/drawings
pub async fn list_drawings(
    State(state): State<AppState>,
    _claims: Claims,
    Path(proposal_id): Path<String>,
) -> Result<Json<Vec<DrawingResponse>>, (StatusCode, String)> {
    let db = state.db.clone();

    let drawings = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM drawings WHERE proposal_id = ?1 ORDER BY drawing_number, title",
                COLUMNS
            ))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Prepare: {}", e)))?;

        let drawings = stmt
            .query_map([&proposal_id], read_row)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Read: {}", e)))?;

        Ok::<_, (StatusCode, String)>(drawings)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(drawings))
}

/// POST /api/proposals/{proposal_id}/drawings
pub async fn create_drawing(
    State(state): State<AppState>,
    claims: Claims,
    Path(proposal_id): Path<String>,
    Json(req): Json<CreateDrawingRequest>,
) -> Result<(StatusCode, Json<DrawingResponse>), (StatusCode, String)> {
    if req.title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Title cannot be empty".to_string()));
    }
    let format = req.format.unwrap_or_else(|| "pdf".to_string());
    let status = req.status.unwrap_or_else(|| "tbd".to_string());
    validate_enum(&format, FORMATS, "drawing format")?;
    validate_enum(&status, STATUSES, "drawing status")?;

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let drawing = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        if !proposal_exists(&conn, &proposal_id) {
            return Err((StatusCode::NOT_FOUND, "Proposal not found".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO drawings (id, proposal_id, wbs_id, deliverable_id, drawing_number,
             title, discipline, scale, format, due_date, responsible_party, revision, status,
             updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            rusqlite::params![
                id,
                proposal_id,
                req.wbs_id,
                req.deliverable_id,
                req.drawing_number,
                req.title,
                req.discipline,
                req.scale,
                format,
                req.due_date,
                req.responsible_party,
                req.revision,
                status,
                user_id,
                now
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert drawing: {}", e)))?;

        Ok::<_, (StatusCode, String)>(DrawingResponse {
            id,
            proposal_id,
            wbs_id: req.wbs_id,
            deliverable_id: req.deliverable_id,
            drawing_number: req.drawing_number,
            title: req.title,
            discipline: req.discipline,
            scale: req.scale,
            format,
            due_date: req.due_date,
            responsible_party: req.responsible_party,
            revision: req.revision,
            status,
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok((StatusCode::CREATED, Json(drawing)))
}

/// PATCH /api/proposals/{proposal_id}/drawings/{drawing_id}
pub async fn update_drawing(
    State(state): State<AppState>,
    claims: Claims,
    Path((proposal_id, drawing_id)): Path<(String, String)>,
    Json(req): Json<UpdateDrawingRequest>,
) -> Result<Json<DrawingResponse>, (StatusCode, String)> {
    if let Some(format) = &req.format {
        validate_enum(format, FORMATS, "drawing format")?;
    }
    if let Some(status) = &req.status {
        validate_enum(status, STATUSES, "drawing status")?;
    }

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let drawing = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut drawing = conn
            .query_row(
                &format!(
                    "SELECT {} FROM drawings WHERE id = ?1 AND proposal_id = ?2",
                    COLUMNS
                ),
                rusqlite::params![drawing_id, proposal_id],
                read_row,
            )
            .map_err(|_| (StatusCode::NOT_FOUND, "Drawing not found".to_string()))?;

        if let Some(wbs_id) = req.wbs_id {
            drawing.wbs_id = Some(wbs_id);
        }
        if let Some(deliverable_id) = req.deliverable_id {
            drawing.deliverable_id = Some(deliverable_id);
        }
        if let Some(number) = req.drawing_number {
            drawing.drawing_number = Some(number);
        }
        if let Some(title) = req.title {
            drawing.title = title;
        }
        if let Some(discipline) = req.discipline {
            drawing.discipline = Some(discipline);
        }
        if let Some(scale) = req.scale {
            drawing.scale = Some(scale);
        }
        if let Some(format) = req.format {
            drawing.format = format;
        }
        if let Some(date) = req.due_date {
            drawing.due_date = Some(date);
        }
        if let Some(party) = req.responsible_party {
            drawing.responsible_party = Some(party);
        }
        if let Some(revision) = req.revision {
            drawing.revision = Some(revision);
        }
        if let Some(status) = req.status {
            drawing.status = status;
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE drawings SET wbs_id = ?1, deliverable_id = ?2, drawing_number = ?3,
             title = ?4, discipline = ?5, scale = ?6, format = ?7, due_date = ?8,
             responsible_party = ?9, revision = ?10, status = ?11, updated_by = ?12,
             updated_at = ?13 WHERE id = ?14",
            rusqlite::params![
                drawing.wbs_id,
                drawing.deliverable_id,
                drawing.drawing_number,
                drawing.title,
                drawing.discipline,
                drawing.scale,
                drawing.format,
                drawing.due_date,
                drawing.responsible_party,
                drawing.revision,
                drawing.status,
                user_id,
                now,
                drawing.id
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update drawing: {}", e)))?;

        Ok::<_, (StatusCode, String)>(drawing)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(drawing))
}

/// DELETE /api/proposals/{proposal_id}/drawings/{drawing_id}
pub async fn delete_drawing(
    State(state): State<AppState>,
    _claims: Claims,
    Path((proposal_id, drawing_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let rows = conn
            .execute(
                "DELETE FROM drawings WHERE id = ?1 AND proposal_id = ?2",
                rusqlite::params![drawing_id, proposal_id],
            )
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Delete drawing: {}", e)))?;

        if rows == 0 {
            return Err((StatusCode::NOT_FOUND, "Drawing not found".to_string()));
        }
        Ok::<_, (StatusCode, String)>(())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(StatusCode::NO_CONTENT)
}
