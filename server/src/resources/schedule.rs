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
pub struct ScheduleItemResponse {
    pub id: String,
    pub proposal_id: String,
    pub wbs_id: Option<String>,
    pub task_name: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub responsible_party: Option<String>,
    pub is_milestone: bool,
    pub phase: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleItemRequest {
    pub wbs_id: Option<String>,
    pub task_name: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub responsible_party: Option<String>,
    #[serde(default)]
    pub is_milestone: bool,
    pub phase: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleItemRequest {
    pub wbs_id: Option<String>,
    pub task_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub responsible_party: Option<String>,
    pub is_milestone: Option<bool>,
    pub phase: Option<String>,
}

const COLUMNS: &str =
    "id, proposal_id, wbs_id, task_name, start_date, end_date, responsible_party, is_milestone, phase";

fn read_row(row: &rusqlite::Row<'_>) -> Result<ScheduleItemResponse, rusqlite::Error> {
    Ok(ScheduleItemResponse {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        wbs_id: row.get(2)?,
        task_name: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        responsible_party: row.get(6)?,
        is_milestone: row.get::<_, i64>(7)? != 0,
        phase: row.get(8)?,
    })
}

/// GET /api/proposals/{proposal_id}/schedule
pub async fn list_schedule(
    State(state): State<AppState>,
    _claims: Claims,
    Path(proposal_id): Path<String>,
) -> Result<Json<Vec<ScheduleItemResponse>>, (StatusCode, String)> {
    let db = state.db.clone();

    let items = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM schedule_items WHERE proposal_id = ?1 ORDER BY start_date, task_name",
                COLUMNS
            ))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Prepare: {}", e)))?;

        let items = stmt
            .query_map([&proposal_id], read_row)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Read: {}", e)))?;

        Ok::<_, (StatusCode, String)>(items)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(items))
}

/// POST /api/proposals/{proposal_id}/schedule
pub async fn create_schedule_item(
    State(state): State<AppState>,
    claims: Claims,
    Path(proposal_id): Path<String>,
    Json(req): Json<CreateScheduleItemRequest>,
) -> Result<(StatusCode, Json<ScheduleItemResponse>), (StatusCode, String)> {
    if req.task_name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Task name cannot be empty".to_string(),
        ));
    }

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let item = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        if !proposal_exists(&conn, &proposal_id) {
            return Err((StatusCode::NOT_FOUND, "Proposal not found".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO schedule_items (id, proposal_id, wbs_id, task_name, start_date, end_date,
             responsible_party, is_milestone, phase, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                id,
                proposal_id,
                req.wbs_id,
                req.task_name,
                req.start_date,
                req.end_date,
                req.responsible_party,
                req.is_milestone as i64,
                req.phase,
                user_id,
                now
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert schedule item: {}", e)))?;

        Ok::<_, (StatusCode, String)>(ScheduleItemResponse {
            id,
            proposal_id,
            wbs_id: req.wbs_id,
            task_name: req.task_name,
            start_date: req.start_date,
            end_date: req.end_date,
            responsible_party: req.responsible_party,
            is_milestone: req.is_milestone,
            phase: req.phase,
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /api/proposals/{proposal_id}/schedule/{item_id}
pub async fn update_schedule_item(
    State(state): State<AppState>,
    claims: Claims,
    Path((proposal_id, item_id)): Path<(String, String)>,
    Json(req): Json<UpdateScheduleItemRequest>,
) -> Result<Json<ScheduleItemResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let item = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut item = conn
            .query_row(
                &format!(
                    "SELECT {} FROM schedule_items WHERE id = ?1 AND proposal_id = ?2",
                    COLUMNS
                ),
                rusqlite::params![item_id, proposal_id],
                read_row,
            )
            .map_err(|_| (StatusCode::NOT_FOUND, "Schedule item not found".to_string()))?;

        if let Some(wbs_id) = req.wbs_id {
            item.wbs_id = Some(wbs_id);
        }
        if let Some(name) = req.task_name {
            item.task_name = name;
        }
        if let Some(date) = req.start_date {
            item.start_date = Some(date);
        }
        if let Some(date) = req.end_date {
            item.end_date = Some(date);
        }
        if let Some(party) = req.responsible_party {
            item.responsible_party = Some(party);
        }
        if let Some(milestone) = req.is_milestone {
            item.is_milestone = milestone;
        }
        if let Some(phase) = req.phase {
            item.phase = Some(phase);
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE schedule_items SET wbs_id = ?1, task_name = ?2, start_date = ?3, end_date = ?4,
             responsible_party = ?5, is_milestone = ?6, phase = ?7, updated_by = ?8, updated_at = ?9
             WHERE id = ?10",
            rusqlite::params![
                item.wbs_id,
                item.task_name,
                item.start_date,
                item.end_date,
                item.responsible_party,
                item.is_milestone as i64,
                item.phase,
                user_id,
                now,
                item.id
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update schedule item: {}", e)))?;

        Ok::<_, (StatusCode, String)>(item)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(item))
}

/// DELETE /api/proposals/{proposal_id}/schedule/{item_id}
pub async fn delete_schedule_item(
    State(state): State<AppState>,
    _claims: Claims,
    Path((proposal_id, item_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let rows = conn
            .execute(
                "DELETE FROM schedule_items WHERE id = ?1 AND proposal_id = ?2",
                rusqlite::params![item_id, proposal_id],
            )
            .map_err(|e| {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Delete schedule item: {}", e))
            })?;

        if rows == 0 {
            return Err((StatusCode::NOT_FOUND, "Schedule item not found".to_string()));
        }
        Ok::<_, (StatusCode, String)>(())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(StatusCode::NO_CONTENT)
}
