//! REST endpoints for user accounts: registration and lookup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::User;
use crate::state::AppState;

/// Name length bounds carried over from the original schema validation.
const MIN_NAME_LENGTH: usize = 3;
const MAX_NAME_LENGTH: usize = 20;
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub password: String,
}

/// User payload returned to clients. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role: String,
    pub registration_date: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            firstname: user.firstname,
            lastname: user.lastname,
            role: user.role,
            registration_date: user.registration_date,
        }
    }
}

/// POST /api/users — Register a new account.
/// 422 on validation failure, 409 when the email is already taken.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), StatusCode> {
    let email = body.email.trim().to_lowercase();
    let firstname = body.firstname.trim().to_string();
    let lastname = body.lastname.trim().to_string();

    if email.is_empty() || !email.contains('@') {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    for name in [&firstname, &lastname] {
        if name.len() < MIN_NAME_LENGTH || name.len() > MAX_NAME_LENGTH {
            return Err(StatusCode::UNPROCESSABLE_ENTITY);
        }
    }
    if body.password.len() < MIN_PASSWORD_LENGTH {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    // Hash off the async runtime; bcrypt is deliberately slow
    let password = body.password;
    let password_hash = tokio::task::spawn_blocking(move || {
        bcrypt::hash(&password, bcrypt::DEFAULT_COST)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO users (id, email, firstname, lastname, password_hash, role, registration_date)
             VALUES (?1, ?2, ?3, ?4, ?5, 'user', ?6)",
            rusqlite::params![id, email, firstname, lastname, password_hash, now],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

        Ok::<_, StatusCode>(User {
            id,
            email,
            firstname,
            lastname,
            password_hash,
            role: "user".to_string(),
            registration_date: now,
        })
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/users — List all users.
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, StatusCode> {
    let db = state.db.clone();

    let users = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, email, firstname, lastname, role, registration_date
                 FROM users ORDER BY lastname, firstname",
            )
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let users: Vec<UserResponse> = stmt
            .query_map([], |row| {
                Ok(UserResponse {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    firstname: row.get(2)?,
                    lastname: row.get(3)?,
                    role: row.get(4)?,
                    registration_date: row.get(5)?,
                })
            })
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .filter_map(|r| r.ok())
            .collect();

        Ok::<_, StatusCode>(users)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(users))
}

/// GET /api/users/{id} — Fetch one user. 404 when absent.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, StatusCode> {
    let db = state.db.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        crate::db::models::find_user_by_id(&conn, &id)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(user.into()))
}
