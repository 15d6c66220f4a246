use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::auth::{jwt, password};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// POST /api/auth/login — Exchange email + password for an access token.
/// Rate limited per IP. Returns 401 on unknown email or bad password,
/// without distinguishing the two.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let email = body.email.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let row = conn
            .query_row(
                "SELECT id, name, password_salt, password_hash FROM users WHERE email = ?1",
                [&email],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;

        Ok::<_, (StatusCode, String)>(row)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    let (user_id, name, salt, hash) = user;
    if !password::verify_password(&salt, &body.password, &hash) {
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    }

    let token = jwt::issue_access_token(
        &state.jwt_secret,
        &user_id,
        &name,
        state.token_expire_minutes,
    )
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Token issue: {}", e)))?;

    tracing::info!(user_id = %user_id, "User logged in");

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

/// GET /api/auth/me — Return the authenticated user's profile.
pub async fn me(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        conn.query_row(
            "SELECT id, name, email, role FROM users WHERE id = ?1",
            [&user_id],
            |row| {
                Ok(UserResponse {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get(3)?,
                })
            },
        )
        .map_err(|_| (StatusCode::UNAUTHORIZED, "Unknown user".to_string()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(user))
}
