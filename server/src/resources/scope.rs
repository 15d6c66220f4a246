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

#[derive(Debug, Serialize, Deserialize)]
pub struct ScopeSectionResponse {
    pub id: String,
    pub proposal_id: String,
    pub section_name: String,
    pub content: String,
    pub order_index: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateScopeSectionRequest {
    pub section_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub order_index: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateScopeSectionRequest {
    pub section_name: Option<String>,
    pub content: Option<String>,
    pub order_index: Option<i64>,
}

const COLUMNS: &str = "id, proposal_id, section_name, content, order_index";

fn read_row(row: &rusqlite::Row<'_>) -> Result<ScopeSectionResponse, rusqlite::Error> {
    Ok(ScopeSectionResponse {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        section_name: row.get(2)?,
        content: row.get(3)?,
        order_index: row.get(4)?,
    })
}

/// GET /api/proposals/{proposal_id}/scope
pub async fn list_scope(
    State(state): State<AppState>,
    _claims: Claims,
    Path(proposal_id): Path<String>,
) -> Result<Json<Vec<ScopeSectionResponse>>, (StatusCode, String)> {
    let db = state.db.clone();

    let sections = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM scope_sections WHERE proposal_id = ?1 ORDER BY order_index",
                COLUMNS
            ))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Prepare: {}", e)))?;

        let sections = stmt
            .query_map([&proposal_id], read_row)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Read: {}", e)))?;

        Ok::<_, (StatusCode, String)>(sections)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(sections))
}

/// POST /api/proposals/{proposal_id}/scope
pub async fn create_scope_section(
    State(state): State<AppState>,
    claims: Claims,
    Path(proposal_id): Path<String>,
    Json(req): Json<CreateScopeSectionRequest>,
) -> Result<(StatusCode, Json<ScopeSectionResponse>), (StatusCode, String)> {
    if req.section_name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Section name cannot be empty".to_string(),
        ));
    }

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let section = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        if !proposal_exists(&conn, &proposal_id) {
            return Err((StatusCode::NOT_FOUND, "Proposal not found".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO scope_sections (id, proposal_id, section_name, content, order_index, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![id, proposal_id, req.section_name, req.content, req.order_index, user_id, now],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert scope section: {}", e)))?;

        Ok::<_, (StatusCode, String)>(ScopeSectionResponse {
            id,
            proposal_id,
            section_name: req.section_name,
            content: req.content,
            order_index: req.order_index,
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok((StatusCode::CREATED, Json(section)))
}

/// PATCH /api/proposals/{proposal_id}/scope/{section_id}
pub async fn update_scope_section(
    State(state): State<AppState>,
    claims: Claims,
    Path((proposal_id, section_id)): Path<(String, String)>,
    Json(req): Json<UpdateScopeSectionRequest>,
) -> Result<Json<ScopeSectionResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let section = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut section = conn
            .query_row(
                &format!(
                    "SELECT {} FROM scope_sections WHERE id = ?1 AND proposal_id = ?2",
                    COLUMNS
                ),
                rusqlite::params![section_id, proposal_id],
                read_row,
            )
            .map_err(|_| (StatusCode::NOT_FOUND, "Scope section not found".to_string()))?;

        if let Some(name) = req.section_name {
            section.section_name = name;
        }
        if let Some(content) = req.content {
            section.content = content;
        }
        if let Some(idx) = req.order_index {
            section.order_index = idx;
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE scope_sections SET section_name = ?1, content = ?2, order_index = ?3,
             updated_by = ?4, updated_at = ?5 WHERE id = ?6",
            rusqlite::params![
                section.section_name,
                section.content,
                section.order_index,
                user_id,
                now,
                section.id
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update scope section: {}", e)))?;

        Ok::<_, (StatusCode, String)>(section)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(section))
}

/// DELETE /api/proposals/{proposal_id}/scope/{section_id}
pub async fn delete_scope_section(
    State(state): State<AppState>,
    _claims: Claims,
    Path((proposal_id, section_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let rows = conn
            .execute(
                "DELETE FROM scope_sections WHERE id = ?1 AND proposal_id = ?2",
                rusqlite::params![section_id, proposal_id],
            )
            .map_err(|e| {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Delete scope section: {}", e))
            })?;

        if rows == 0 {
            return Err((StatusCode::NOT_FOUND, "Scope section not found".to_string()));
        }
        Ok::<_, (StatusCode, String)>(())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(StatusCode::NO_CONTENT)
}
