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
use crate::wbs::routes::sum_phase_hours;

#[derive(Debug, Serialize, Deserialize)]
pub struct PricingRowResponse {
    pub id: String,
    pub proposal_id: String,
    pub wbs_id: Option<String>,
    pub person_id: Option<String>,
    // Denormalised from the linked person for display
    pub person_name: Option<String>,
    pub person_role: Option<String>,
    pub person_team: Option<String>,
    pub hourly_rate: f64,
    pub hours_by_phase: HashMap<String, f64>,
    pub total_hours: f64,
    pub total_cost: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePricingRowRequest {
    pub wbs_id: Option<String>,
    pub person_id: Option<String>,
    #[serde(default)]
    pub hourly_rate: f64,
    #[serde(default)]
    pub hours_by_phase: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePricingRowRequest {
    pub wbs_id: Option<String>,
    pub person_id: Option<String>,
    pub hourly_rate: Option<f64>,
    pub hours_by_phase: Option<HashMap<String, f64>>,
}

struct PricingRow {
    id: String,
    proposal_id: String,
    wbs_id: Option<String>,
    person_id: Option<String>,
    hourly_rate: f64,
    hours_by_phase: String,
}

struct PersonSummary {
    name: String,
    role: Option<String>,
    team: Option<String>,
    hourly_rate: Option<f64>,
}

const COLUMNS: &str = "id, proposal_id, wbs_id, person_id, hourly_rate, hours_by_phase";

fn read_row(row: &rusqlite::Row<'_>) -> Result<PricingRow, rusqlite::Error> {
    Ok(PricingRow {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        wbs_id: row.get(2)?,
        person_id: row.get(3)?,
        hourly_rate: row.get(4)?,
        hours_by_phase: row.get(5)?,
    })
}

fn load_person(conn: &rusqlite::Connection, person_id: &str) -> Option<PersonSummary> {
    conn.query_row(
        "SELECT employee_name, job_role, team, hourly_rate FROM proposed_people WHERE id = ?1",
        [person_id],
        |row| {
            Ok(PersonSummary {
                name: row.get(0)?,
                role: row.get(1)?,
                team: row.get(2)?,
                hourly_rate: row.get(3)?,
            })
        },
    )
    .ok()
}

fn to_response(row: PricingRow, person: Option<&PersonSummary>) -> PricingRowResponse {
    let phases: HashMap<String, f64> =
        serde_json::from_str(&row.hours_by_phase).unwrap_or_default();
    let total_hours = sum_phase_hours(&row.hours_by_phase);
    let total_cost = total_hours * row.hourly_rate;
    PricingRowResponse {
        id: row.id,
        proposal_id: row.proposal_id,
        wbs_id: row.wbs_id,
        person_id: row.person_id,
        person_name: person.map(|p| p.name.clone()),
        person_role: person.and_then(|p| p.role.clone()),
        person_team: person.and_then(|p| p.team.clone()),
        hourly_rate: row.hourly_rate,
        hours_by_phase: phases,
        total_hours,
        total_cost,
    }
}

/// GET /api/proposals/{proposal_id}/pricing — Rows in edit order, with
/// person details and computed totals.
pub async fn list_pricing(
    State(state): State<AppState>,
    _claims: Claims,
    Path(proposal_id): Path<String>,
) -> Result<Json<Vec<PricingRowResponse>>, (StatusCode, String)> {
    let db = state.db.clone();

    let rows = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM pricing_rows WHERE proposal_id = ?1 ORDER BY updated_at",
                COLUMNS
            ))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Prepare: {}", e)))?;

        let rows = stmt
            .query_map([&proposal_id], read_row)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Read: {}", e)))?;

        let out = rows
            .into_iter()
            .map(|row| {
                let person = row.person_id.as_deref().and_then(|id| load_person(&conn, id));
                to_response(row, person.as_ref())
            })
            .collect::<Vec<_>>();

        Ok::<_, (StatusCode, String)>(out)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(rows))
}

/// POST /api/proposals/{proposal_id}/pricing — Create a row. When a
/// person is linked and no rate given, the person's rate is used.
pub async fn create_pricing(
    State(state): State<AppState>,
    claims: Claims,
    Path(proposal_id): Path<String>,
    Json(req): Json<CreatePricingRowRequest>,
) -> Result<(StatusCode, Json<PricingRowResponse>), (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let row = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        if !proposal_exists(&conn, &proposal_id) {
            return Err((StatusCode::NOT_FOUND, "Proposal not found".to_string()));
        }

        let person = req.person_id.as_deref().and_then(|id| load_person(&conn, id));
        let rate = if req.hourly_rate == 0.0 {
            person
                .as_ref()
                .and_then(|p| p.hourly_rate)
                .unwrap_or(req.hourly_rate)
        } else {
            req.hourly_rate
        };

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let phases_json = serde_json::to_string(&req.hours_by_phase)
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("hours_by_phase: {}", e)))?;

        conn.execute(
            "INSERT INTO pricing_rows (id, proposal_id, wbs_id, person_id, hourly_rate, hours_by_phase, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![id, proposal_id, req.wbs_id, req.person_id, rate, phases_json, user_id, now],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert pricing row: {}", e)))?;

        let row = PricingRow {
            id,
            proposal_id,
            wbs_id: req.wbs_id,
            person_id: req.person_id,
            hourly_rate: rate,
            hours_by_phase: phases_json,
        };
        Ok::<_, (StatusCode, String)>(to_response(row, person.as_ref()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok((StatusCode::CREATED, Json(row)))
}

/// PATCH /api/proposals/{proposal_id}/pricing/{row_id} — Partial
/// update. When the person link changes and the rate is not in the
/// patch, the rate refreshes from the new person.
pub async fn update_pricing(
    State(state): State<AppState>,
    claims: Claims,
    Path((proposal_id, row_id)): Path<(String, String)>,
    Json(req): Json<UpdatePricingRowRequest>,
) -> Result<Json<PricingRowResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let row = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM pricing_rows WHERE id = ?1 AND proposal_id = ?2",
                    COLUMNS
                ),
                rusqlite::params![row_id, proposal_id],
                read_row,
            )
            .map_err(|_| (StatusCode::NOT_FOUND, "Pricing row not found".to_string()))?;

        let person_changed = req.person_id.is_some();
        if let Some(wbs_id) = req.wbs_id {
            row.wbs_id = Some(wbs_id);
        }
        if let Some(person_id) = req.person_id {
            row.person_id = Some(person_id);
        }
        if let Some(phases) = req.hours_by_phase {
            row.hours_by_phase = serde_json::to_string(&phases)
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("hours_by_phase: {}", e)))?;
        }

        let person = row.person_id.as_deref().and_then(|id| load_person(&conn, id));
        match req.hourly_rate {
            Some(rate) => row.hourly_rate = rate,
            None if person_changed => {
                if let Some(rate) = person.as_ref().and_then(|p| p.hourly_rate) {
                    row.hourly_rate = rate;
                }
            }
            None => {}
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE pricing_rows SET wbs_id = ?1, person_id = ?2, hourly_rate = ?3, hours_by_phase = ?4,
             updated_by = ?5, updated_at = ?6 WHERE id = ?7",
            rusqlite::params![
                row.wbs_id,
                row.person_id,
                row.hourly_rate,
                row.hours_by_phase,
                user_id,
                now,
                row.id
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update pricing row: {}", e)))?;

        Ok::<_, (StatusCode, String)>(to_response(row, person.as_ref()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(row))
}

/// DELETE /api/proposals/{proposal_id}/pricing/{row_id}
pub async fn delete_pricing(
    State(state): State<AppState>,
    _claims: Claims,
    Path((proposal_id, row_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let rows = conn
            .execute(
                "DELETE FROM pricing_rows WHERE id = ?1 AND proposal_id = ?2",
                rusqlite::params![row_id, proposal_id],
            )
            .map_err(|e| {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Delete pricing row: {}", e))
            })?;

        if rows == 0 {
            return Err((StatusCode::NOT_FOUND, "Pricing row not found".to_string()));
        }
        Ok::<_, (StatusCode, String)>(())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(StatusCode::NO_CONTENT)
}
