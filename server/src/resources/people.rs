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
pub struct PersonResponse {
    pub id: String,
    pub proposal_id: String,
    pub employee_name: String,
    pub employee_id: Option<String>,
    pub job_role: Option<String>,
    pub team: Option<String>,
    pub role_on_project: Option<String>,
    pub hourly_rate: Option<f64>,
    pub years_experience: Option<i64>,
    pub cv_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePersonRequest {
    pub employee_name: String,
    pub employee_id: Option<String>,
    pub job_role: Option<String>,
    pub team: Option<String>,
    pub role_on_project: Option<String>,
    pub hourly_rate: Option<f64>,
    pub years_experience: Option<i64>,
    pub cv_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePersonRequest {
    pub employee_name: Option<String>,
    pub employee_id: Option<String>,
    pub job_role: Option<String>,
    pub team: Option<String>,
    pub role_on_project: Option<String>,
    pub hourly_rate: Option<f64>,
    pub years_experience: Option<i64>,
    pub cv_path: Option<String>,
}

const COLUMNS: &str = "id, proposal_id, employee_name, employee_id, job_role, team, \
                       role_on_project, hourly_rate, years_experience, cv_path";

fn read_row(row: &rusqlite::Row<'_>) -> Result<PersonResponse, rusqlite::Error> {
    Ok(PersonResponse {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        employee_name: row.get(2)?,
        employee_id: row.get(3)?,
        job_role: row.get(4)?,
        team: row.get(5)?,
        role_on_project: row.get(6)?,
        hourly_rate: row.get(7)?,
        years_experience: row.get(8)?,
        cv_path: row.get(9)?,
    })
}

/// GET /api/proposals/{proposal_id}/people
pub async fn list_people(
    State(state): State<AppState>,
    _claims: Claims,
    Path(proposal_id): Path<String>,
) -> Result<Json<Vec<PersonResponse>>, (StatusCode, String)> {
    let db = state.db.clone();

    let people = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM proposed_people WHERE proposal_id = ?1 ORDER BY employee_name",
                COLUMNS
            ))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Prepare: {}", e)))?;

        let people = stmt
            .query_map([&proposal_id], read_row)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Read: {}", e)))?;

        Ok::<_, (StatusCode, String)>(people)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(people))
}

/// POST /api/proposals/{proposal_id}/people
pub async fn create_person(
    State(state): State<AppState>,
    claims: Claims,
    Path(proposal_id): Path<String>,
    Json(req): Json<CreatePersonRequest>,
) -> Result<(StatusCode, Json<PersonResponse>), (StatusCode, String)> {
    if req.employee_name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Employee name cannot be empty".to_string(),
        ));
    }

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let person = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        if !proposal_exists(&conn, &proposal_id) {
            return Err((StatusCode::NOT_FOUND, "Proposal not found".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO proposed_people (id, proposal_id, employee_name, employee_id, job_role, team,
             role_on_project, hourly_rate, years_experience, cv_path, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                id,
                proposal_id,
                req.employee_name,
                req.employee_id,
                req.job_role,
                req.team,
                req.role_on_project,
                req.hourly_rate,
                req.years_experience,
                req.cv_path,
                user_id,
                now
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert person: {}", e)))?;

        Ok::<_, (StatusCode, String)>(PersonResponse {
            id,
            proposal_id,
            employee_name: req.employee_name,
            employee_id: req.employee_id,
            job_role: req.job_role,
            team: req.team,
            role_on_project: req.role_on_project,
            hourly_rate: req.hourly_rate,
            years_experience: req.years_experience,
            cv_path: req.cv_path,
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok((StatusCode::CREATED, Json(person)))
}

/// PATCH /api/proposals/{proposal_id}/people/{person_id}
pub async fn update_person(
    State(state): State<AppState>,
    claims: Claims,
    Path((proposal_id, person_id)): Path<(String, String)>,
    Json(req): Json<UpdatePersonRequest>,
) -> Result<Json<PersonResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let person = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let mut person = conn
            .query_row(
                &format!(
                    "SELECT {} FROM proposed_people WHERE id = ?1 AND proposal_id = ?2",
                    COLUMNS
                ),
                rusqlite::params![person_id, proposal_id],
                read_row,
            )
            .map_err(|_| (StatusCode::NOT_FOUND, "Person not found".to_string()))?;

        if let Some(name) = req.employee_name {
            person.employee_name = name;
        }
        if let Some(eid) = req.employee_id {
            person.employee_id = Some(eid);
        }
        if let Some(role) = req.job_role {
            person.job_role = Some(role);
        }
        if let Some(team) = req.team {
            person.team = Some(team);
        }
        if let Some(role) = req.role_on_project {
            person.role_on_project = Some(role);
        }
        if let Some(rate) = req.hourly_rate {
            person.hourly_rate = Some(rate);
        }
        if let Some(years) = req.years_experience {
            person.years_experience = Some(years);
        }
        if let Some(cv) = req.cv_path {
            person.cv_path = Some(cv);
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE proposed_people SET employee_name = ?1, employee_id = ?2, job_role = ?3, team = ?4,
             role_on_project = ?5, hourly_rate = ?6, years_experience = ?7, cv_path = ?8,
             updated_by = ?9, updated_at = ?10 WHERE id = ?11",
            rusqlite::params![
                person.employee_name,
                person.employee_id,
                person.job_role,
                person.team,
                person.role_on_project,
                person.hourly_rate,
                person.years_experience,
                person.cv_path,
                user_id,
                now,
                person.id
            ],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update person: {}", e)))?;

        Ok::<_, (StatusCode, String)>(person)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(person))
}

/// DELETE /api/proposals/{proposal_id}/people/{person_id}
pub async fn delete_person(
    State(state): State<AppState>,
    _claims: Claims,
    Path((proposal_id, person_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let rows = conn
            .execute(
                "DELETE FROM proposed_people WHERE id = ?1 AND proposal_id = ?2",
                rusqlite::params![person_id, proposal_id],
            )
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Delete person: {}", e)))?;

        if rows == 0 {
            return Err((StatusCode::NOT_FOUND, "Person not found".to_string()));
        }
        Ok::<_, (StatusCode, String)>(())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(StatusCode::NO_CONTENT)
}
