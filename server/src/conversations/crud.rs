//! REST endpoints for per-activity conversations.
//!
//! Every activity has at most one conversation. Rename, member management
//! and deletion are admin-only, matching the original platform's rules.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::CurrentUser;
use crate::db::models;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameConversationRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: String,
    pub name: String,
    pub activity: String,
    pub users: Vec<String>,
}

/// POST /api/conversations/activity/{id} — Create the conversation for an
/// activity. The caller becomes the initial participant. 404 unknown
/// activity, 409 when the activity already has a conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(activity_id): Path<String>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), StatusCode> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
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

        if models::conversation_for_activity(&conn, &activity_id).is_some() {
            return Err(StatusCode::CONFLICT);
        }

        let id = Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO conversations (id, name, activity_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, name, activity_id],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        conn.execute(
            "INSERT INTO conversation_users (conversation_id, user_id) VALUES (?1, ?2)",
            rusqlite::params![id, user_id],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok::<_, StatusCode>(ConversationResponse {
            id,
            name,
            activity: activity_id,
            users: vec![user_id],
        })
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/conversations — Conversations the caller participates in.
pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ConversationResponse>>, StatusCode> {
    let db = state.db.clone();
    let user_id = user.id.clone();

    let conversations = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.name, c.activity_id
                 FROM conversations c
                 JOIN conversation_users cu ON cu.conversation_id = c.id
                 WHERE cu.user_id = ?1
                 ORDER BY c.name",
            )
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let rows: Vec<(String, String, String)> = stmt
            .query_map(rusqlite::params![user_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .filter_map(|r| r.ok())
            .collect();

        let conversations = rows
            .into_iter()
            .map(|(id, name, activity)| {
                let users = models::conversation_participants(&conn, &id);
                ConversationResponse {
                    id,
                    name,
                    activity,
                    users,
                }
            })
            .collect();

        Ok::<_, StatusCode>(conversations)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(conversations))
}

/// PATCH /api/conversations/{id} — Rename. Admin only.
pub async fn rename_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<RenameConversationRequest>,
) -> Result<StatusCode, StatusCode> {
    if !user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let db = state.db.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        conn.execute(
            "UPDATE conversations SET name = ?1 WHERE id = ?2",
            rusqlite::params![name, id],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    if updated == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::OK)
}

/// POST /api/conversations/{id}/users — Add a user. Admin only.
/// 409 when the user is already a participant.
pub async fn add_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<AddUserRequest>,
) -> Result<StatusCode, StatusCode> {
    if !user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let conversation_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM conversations WHERE id = ?1",
                rusqlite::params![id],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if !conversation_exists {
            return Err(StatusCode::NOT_FOUND);
        }
        if models::find_user_by_id(&conn, &body.user).is_none() {
            return Err(StatusCode::NOT_FOUND);
        }

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO conversation_users (conversation_id, user_id)
                 VALUES (?1, ?2)",
                rusqlite::params![id, body.user],
            )
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if inserted == 0 {
            return Err(StatusCode::CONFLICT);
        }

        Ok::<_, StatusCode>(())
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(StatusCode::OK)
}

/// DELETE /api/conversations/{id} — Delete. Admin only.
pub async fn delete_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    if !user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    let db = state.db.clone();
    let deleted = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        conn.execute(
            "DELETE FROM conversations WHERE id = ?1",
            rusqlite::params![id],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
