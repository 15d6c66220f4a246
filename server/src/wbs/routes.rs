use std::collections::HashMap;

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
use crate::wbs::rollup::{rollup, RollupNode, Totals};

// --- Response types ---

#[derive(Debug, Serialize, Deserialize)]
pub struct WbsItemResponse {
    pub id: String,
    pub proposal_id: String,
    pub wbs_code: String,
    pub description: Option<String>,
    pub phase: Option<String>,
    pub order_index: i64,
    /// Aggregate over this node and all descendants, from pricing rows.
    pub total_hours: f64,
    pub total_cost: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WbsLinksResponse {
    pub total: i64,
    pub counts: HashMap<String, i64>,
}

// --- Request types ---

#[derive(Debug, Deserialize)]
pub struct CreateWbsItemRequest {
    pub wbs_code: String,
    pub description: Option<String>,
    pub phase: Option<String>,
    #[serde(default)]
    pub order_index: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWbsItemRequest {
    pub wbs_code: Option<String>,
    pub description: Option<String>,
    pub phase: Option<String>,
    pub order_index: Option<i64>,
}

/// Stored row without derived totals.
struct WbsItemRow {
    id: String,
    proposal_id: String,
    wbs_code: String,
    description: Option<String>,
    phase: Option<String>,
    order_index: i64,
}

impl WbsItemRow {
    fn into_response(self, totals: Totals) -> WbsItemResponse {
        WbsItemResponse {
            id: self.id,
            proposal_id: self.proposal_id,
            wbs_code: self.wbs_code,
            description: self.description,
            phase: self.phase,
            order_index: self.order_index,
            total_hours: totals.hours,
            total_cost: totals.cost,
        }
    }
}

fn read_item_row(row: &rusqlite::Row<'_>) -> Result<WbsItemRow, rusqlite::Error> {
    Ok(WbsItemRow {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        wbs_code: row.get(2)?,
        description: row.get(3)?,
        phase: row.get(4)?,
        order_index: row.get(5)?,
    })
}

const ITEM_COLUMNS: &str = "id, proposal_id, wbs_code, description, phase, order_index";

fn load_items(
    conn: &rusqlite::Connection,
    proposal_id: &str,
) -> Result<Vec<WbsItemRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM wbs_items WHERE proposal_id = ?1 ORDER BY order_index, wbs_code",
        ITEM_COLUMNS
    ))?;
    let items = stmt
        .query_map([proposal_id], |row| read_item_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Direct hours/cost per WBS node from the pricing rows that link to
/// one. A row contributes sum(hours_by_phase) hours and hours * rate
/// cost; rows without a WBS link feed proposal-level totals only and
/// never appear here.
fn build_pricing_maps(
    conn: &rusqlite::Connection,
    proposal_id: &str,
) -> Result<(HashMap<String, f64>, HashMap<String, f64>), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT wbs_id, hourly_rate, hours_by_phase FROM pricing_rows
         WHERE proposal_id = ?1 AND wbs_id IS NOT NULL",
    )?;
    let rows = stmt.query_map([proposal_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, f64>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut hours_map: HashMap<String, f64> = HashMap::new();
    let mut cost_map: HashMap<String, f64> = HashMap::new();
    for row in rows {
        let (wbs_id, rate, phases_json) = row?;
        let hours = sum_phase_hours(&phases_json);
        *hours_map.entry(wbs_id.clone()).or_default() += hours;
        *cost_map.entry(wbs_id).or_default() += hours * rate;
    }
    Ok((hours_map, cost_map))
}

/// Sum the values of an hours-by-phase JSON object; anything that is
/// not a numeric value counts as zero.
pub(crate) fn sum_phase_hours(phases_json: &str) -> f64 {
    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(phases_json)
        .map(|map| map.values().filter_map(|v| v.as_f64()).sum())
        .unwrap_or(0.0)
}

fn compute_totals(
    conn: &rusqlite::Connection,
    proposal_id: &str,
    items: &[WbsItemRow],
) -> Result<HashMap<String, Totals>, rusqlite::Error> {
    let (hours_map, cost_map) = build_pricing_maps(conn, proposal_id)?;
    let nodes: Vec<RollupNode> = items
        .iter()
        .map(|i| RollupNode {
            id: i.id.clone(),
            code: i.wbs_code.clone(),
        })
        .collect();
    Ok(rollup(&nodes, &hours_map, &cost_map))
}

// --- Handlers ---

/// GET /api/proposals/{proposal_id}/wbs — List items with rolled-up totals.
pub async fn list_wbs(
    State(state): State<AppState>,
    _claims: Claims,
    Path(proposal_id): Path<String>,
) -> Result<Json<Vec<WbsItemResponse>>, (StatusCode, String)> {
    let db = state.db.clone();

    let items = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let items = load_items(&conn, &proposal_id)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("List WBS: {}", e)))?;
        let totals = compute_totals(&conn, &proposal_id, &items)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Rollup: {}", e)))?;

        Ok::<_, (StatusCode, String)>(
            items
                .into_iter()
                .map(|item| {
                    let t = totals.get(&item.id).copied().unwrap_or_default();
                    item.into_response(t)
                })
                .collect::<Vec<_>>(),
        )
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(items))
}

/// POST /api/proposals/{proposal_id}/wbs — Create an item.
/// A fresh item has no pricing attached, so its totals are zero.
pub async fn create_wbs_item(
    State(state): State<AppState>,
    claims: Claims,
    Path(proposal_id): Path<String>,
    Json(req): Json<CreateWbsItemRequest>,
) -> Result<(StatusCode, Json<WbsItemResponse>), (StatusCode, String)> {
    if req.wbs_code.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "WBS code cannot be empty".to_string(),
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

        let item_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO wbs_items (id, proposal_id, wbs_code, description, phase, order_index, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                item_id,
                proposal_id,
                req.wbs_code,
                req.description,
                req.phase,
                req.order_index,
                user_id,
                now
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert WBS item: {}", e)))?;

        Ok::<_, (StatusCode, String)>(WbsItemResponse {
            id: item_id,
            proposal_id,
            wbs_code: req.wbs_code,
            description: req.description,
            phase: req.phase,
            order_index: req.order_index,
            total_hours: 0.0,
            total_cost: 0.0,
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /api/proposals/{proposal_id}/wbs/{item_id} — Partial update.
/// Responds with the item carrying freshly recomputed rollup totals.
pub async fn update_wbs_item(
    State(state): State<AppState>,
    claims: Claims,
    Path((proposal_id, item_id)): Path<(String, String)>,
    Json(req): Json<UpdateWbsItemRequest>,
) -> Result<Json<WbsItemResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let item = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut item = conn
            .query_row(
                &format!(
                    "SELECT {} FROM wbs_items WHERE id = ?1 AND proposal_id = ?2",
                    ITEM_COLUMNS
                ),
                rusqlite::params![item_id, proposal_id],
                read_item_row,
            )
            .map_err(|_| (StatusCode::NOT_FOUND, "WBS item not found".to_string()))?;

        if let Some(code) = req.wbs_code {
            item.wbs_code = code;
        }
        if let Some(desc) = req.description {
            item.description = Some(desc);
        }
        if let Some(phase) = req.phase {
            item.phase = Some(phase);
        }
        if let Some(idx) = req.order_index {
            item.order_index = idx;
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE wbs_items SET wbs_code = ?1, description = ?2, phase = ?3, order_index = ?4,
             updated_by = ?5, updated_at = ?6 WHERE id = ?7",
            rusqlite::params![
                item.wbs_code,
                item.description,
                item.phase,
                item.order_index,
                user_id,
                now,
                item.id
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update WBS item: {}", e)))?;

        // Recompute totals over the whole proposal after the update —
        // a code change can reparent entire subtrees.
        let items = load_items(&conn, &proposal_id)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Reload WBS: {}", e)))?;
        let totals = compute_totals(&conn, &proposal_id, &items)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Rollup: {}", e)))?;
        let t = totals.get(&item.id).copied().unwrap_or_default();

        Ok::<_, (StatusCode, String)>(item.into_response(t))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(item))
}

/// DELETE /api/proposals/{proposal_id}/wbs/{item_id}
pub async fn delete_wbs_item(
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
                "DELETE FROM wbs_items WHERE id = ?1 AND proposal_id = ?2",
                rusqlite::params![item_id, proposal_id],
            )
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Delete WBS item: {}", e)))?;

        if rows == 0 {
            return Err((StatusCode::NOT_FOUND, "WBS item not found".to_string()));
        }
        Ok::<_, (StatusCode, String)>(())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/proposals/{proposal_id}/wbs/{item_id}/links — Counts of
/// rows in other tables referencing this node. Used by the UI to warn
/// before a delete.
pub async fn wbs_links(
    State(state): State<AppState>,
    _claims: Claims,
    Path((proposal_id, item_id)): Path<(String, String)>,
) -> Result<Json<WbsLinksResponse>, (StatusCode, String)> {
    let db = state.db.clone();

    let links = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM wbs_items WHERE id = ?1 AND proposal_id = ?2",
                rusqlite::params![item_id, proposal_id],
                |row| row.get(0),
            )
            .unwrap_or(0);
        if exists == 0 {
            return Err((StatusCode::NOT_FOUND, "WBS item not found".to_string()));
        }

        let mut counts: HashMap<String, i64> = HashMap::new();
        for (table, name) in [
            ("pricing_rows", "pricing"),
            ("schedule_items", "schedule"),
            ("deliverables", "deliverables"),
            ("drawings", "drawings"),
        ] {
            let count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {} WHERE wbs_id = ?1", table),
                    [&item_id],
                    |row| row.get(0),
                )
                .map_err(|e| {
                    (StatusCode::INTERNAL_SERVER_ERROR, format!("Count links: {}", e))
                })?;
            counts.insert(name.to_string(), count);
        }

        Ok::<_, (StatusCode, String)>(WbsLinksResponse {
            total: counts.values().sum(),
            counts,
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(links))
}
