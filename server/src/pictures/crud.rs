//! REST endpoints for picture metadata attached to activities.
//!
//! Only metadata is recorded (name, mimetype, size); the platform stores no
//! file bytes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AttachPictureRequest {
    pub name: String,
    pub mimetype: String,
    pub size: i64,
}

#[derive(Debug, Serialize)]
pub struct PictureResponse {
    pub id: String,
    pub name: String,
    pub creator: String,
    pub activity: String,
    pub mimetype: String,
    pub size: i64,
    pub created_at: String,
}

/// POST /api/activities/{id}/pictures — Attach picture metadata. The caller
/// must be enrolled in the activity (403 otherwise).
pub async fn attach_picture(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(activity_id): Path<String>,
    Json(body): Json<AttachPictureRequest>,
) -> Result<(StatusCode, Json<PictureResponse>), StatusCode> {
    if body.name.trim().is_empty() || body.mimetype.trim().is_empty() || body.size < 0 {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let db = state.db.clone();
    let user_id = user.id.clone();

    let response = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let activity_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM activities WHERE id = ?1",
                rusqlite::params![activity_id],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if !activity_exists {
            return Err(StatusCode::NOT_FOUND);
        }

        let is_participant: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM activity_users WHERE activity_id = ?1 AND user_id = ?2",
                rusqlite::params![activity_id, user_id],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if !is_participant {
            return Err(StatusCode::FORBIDDEN);
        }

        let id = Uuid::now_v7().to_string();
        let created_at = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO pictures (id, name, creator, activity_id, mimetype, size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![id, body.name, user_id, activity_id, body.mimetype, body.size, created_at],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok::<_, StatusCode>(PictureResponse {
            id,
            name: body.name,
            creator: user_id,
            activity: activity_id,
            mimetype: body.mimetype,
            size: body.size,
            created_at,
        })
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/activities/{id}/pictures — Pictures for an activity.
pub async fn list_by_activity(
    State(state): State<AppState>,
    Path(activity_id): Path<String>,
) -> Result<Json<Vec<PictureResponse>>, StatusCode> {
    list_pictures(state, "activity_id", activity_id).await
}

/// GET /api/users/{id}/pictures — Pictures uploaded by a user.
pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<PictureResponse>>, StatusCode> {
    list_pictures(state, "creator", user_id).await
}

async fn list_pictures(
    state: AppState,
    column: &'static str,
    value: String,
) -> Result<Json<Vec<PictureResponse>>, StatusCode> {
    let db = state.db.clone();

    let pictures = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let sql = format!(
            "SELECT id, name, creator, activity_id, mimetype, size, created_at
             FROM pictures WHERE {column} = ?1 ORDER BY created_at DESC"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let pictures: Vec<PictureResponse> = stmt
            .query_map(rusqlite::params![value], |row| {
                Ok(PictureResponse {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    creator: row.get(2)?,
                    activity: row.get(3)?,
                    mimetype: row.get(4)?,
                    size: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .filter_map(|r| r.ok())
            .collect();

        Ok::<_, StatusCode>(pictures)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(pictures))
}

/// DELETE /api/pictures/{id} — Remove picture metadata. Owner or admin.
pub async fn delete_picture(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let creator: String = conn
            .query_row(
                "SELECT creator FROM pictures WHERE id = ?1",
                rusqlite::params![id],
                |row| row.get(0),
            )
            .map_err(|_| StatusCode::NOT_FOUND)?;

        if creator != user.id && !user.is_admin() {
            return Err(StatusCode::FORBIDDEN);
        }

        conn.execute("DELETE FROM pictures WHERE id = ?1", rusqlite::params![id])
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok::<_, StatusCode>(())
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(StatusCode::NO_CONTENT)
}
