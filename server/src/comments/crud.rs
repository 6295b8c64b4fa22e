//! REST endpoints for comment CRUD — the domain event producers for
//! NEW_MESSAGE, UPDATE_MESSAGE and DELETE_MESSAGE notifications.
//!
//! A comment belongs to an activity; the activity's conversation supplies
//! the notification audience (participants minus the author). Delivery
//! failures never surface in the HTTP response.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::CurrentUser;
use crate::db::models::{self, User};
use crate::state::AppState;
use crate::ws::dispatch;
use crate::ws::events::{ConversationInfo, EventCode, EventData, MessageInfo, SenderInfo};

/// Content length bounds carried over from the original schema validation.
const MIN_CONTENT_LENGTH: usize = 2;
const MAX_CONTENT_LENGTH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub content: String,
    pub creator: String,
    pub activity: String,
    pub date: String,
}

fn validate_content(content: &str) -> Result<String, StatusCode> {
    let content = content.trim().to_string();
    if content.len() < MIN_CONTENT_LENGTH || content.len() > MAX_CONTENT_LENGTH {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    Ok(content)
}

/// POST /api/activities/{id}/comments — Post a comment. JWT auth required;
/// the author must be enrolled in the activity (403 otherwise). Conversation
/// participants other than the author are notified with NEW_MESSAGE.
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(activity_id): Path<String>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), StatusCode> {
    let content = validate_content(&body.content)?;

    let db = state.db.clone();
    let user_id = user.id.clone();
    let aid = activity_id.clone();
    let stored_content = content.clone();

    let (response, conversation) = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let activity_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM activities WHERE id = ?1",
                rusqlite::params![aid],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if !activity_exists {
            return Err(StatusCode::NOT_FOUND);
        }

        let is_participant: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM activity_users WHERE activity_id = ?1 AND user_id = ?2",
                rusqlite::params![aid, user_id],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if !is_participant {
            return Err(StatusCode::FORBIDDEN);
        }

        let id = Uuid::now_v7().to_string();
        let date = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO comments (id, content, creator, activity_id, date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, stored_content, user_id, aid, date],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let conversation = models::conversation_for_activity(&conn, &aid)
            .map(|conv| {
                let participants = models::conversation_participants(&conn, &conv.id);
                (conv, participants)
            });

        Ok::<_, StatusCode>((
            CommentResponse {
                id,
                content: stored_content,
                creator: user_id,
                activity: aid,
                date,
            },
            conversation,
        ))
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    if let Some((conv, participants)) = conversation {
        notify_comment_event(
            &state,
            &user,
            EventCode::NewMessage,
            &response.id,
            &response.content,
            &conv.id,
            &conv.name,
            &participants,
        );
    }

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/activities/{id}/comments — Comments for an activity, oldest
/// first.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(activity_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, StatusCode> {
    let db = state.db.clone();

    let comments = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, content, creator, activity_id, date
                 FROM comments WHERE activity_id = ?1 ORDER BY date",
            )
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let comments: Vec<CommentResponse> = stmt
            .query_map(rusqlite::params![activity_id], |row| {
                Ok(CommentResponse {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    creator: row.get(2)?,
                    activity: row.get(3)?,
                    date: row.get(4)?,
                })
            })
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .filter_map(|r| r.ok())
            .collect();

        Ok::<_, StatusCode>(comments)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(comments))
}

/// PATCH /api/comments/{id} — Edit a comment. Author or admin only.
/// The audience is notified with UPDATE_MESSAGE carrying the new content.
pub async fn update_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<String>,
    Json(body): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, StatusCode> {
    let content = validate_content(&body.content)?;

    let db = state.db.clone();
    let actor = user.clone();
    let cid = comment_id.clone();
    let new_content = content.clone();

    let (response, conversation) = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let comment = find_comment(&conn, &cid).ok_or(StatusCode::NOT_FOUND)?;
        if comment.creator != actor.id && !actor.is_admin() {
            return Err(StatusCode::FORBIDDEN);
        }

        conn.execute(
            "UPDATE comments SET content = ?1 WHERE id = ?2",
            rusqlite::params![new_content, cid],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let conversation = models::conversation_for_activity(&conn, &comment.activity_id)
            .map(|conv| {
                let participants = models::conversation_participants(&conn, &conv.id);
                (conv, participants)
            });

        Ok::<_, StatusCode>((
            CommentResponse {
                id: comment.id,
                content: new_content,
                creator: comment.creator,
                activity: comment.activity_id,
                date: comment.date,
            },
            conversation,
        ))
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    if let Some((conv, participants)) = conversation {
        notify_comment_event(
            &state,
            &user,
            EventCode::UpdateMessage,
            &response.id,
            &response.content,
            &conv.id,
            &conv.name,
            &participants,
        );
    }

    Ok(Json(response))
}

/// DELETE /api/comments/{id} — Remove a comment. Author or admin only.
/// The audience is notified with DELETE_MESSAGE.
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();
    let actor = user.clone();
    let cid = comment_id.clone();

    let (deleted, conversation) = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let comment = find_comment(&conn, &cid).ok_or(StatusCode::NOT_FOUND)?;
        if comment.creator != actor.id && !actor.is_admin() {
            return Err(StatusCode::FORBIDDEN);
        }

        conn.execute("DELETE FROM comments WHERE id = ?1", rusqlite::params![cid])
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let conversation = models::conversation_for_activity(&conn, &comment.activity_id)
            .map(|conv| {
                let participants = models::conversation_participants(&conn, &conv.id);
                (conv, participants)
            });

        Ok::<_, StatusCode>((comment, conversation))
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    if let Some((conv, participants)) = conversation {
        notify_comment_event(
            &state,
            &user,
            EventCode::DeleteMessage,
            &deleted.id,
            &deleted.content,
            &conv.id,
            &conv.name,
            &participants,
        );
    }

    Ok(StatusCode::NO_CONTENT)
}

fn find_comment(conn: &rusqlite::Connection, id: &str) -> Option<models::Comment> {
    conn.query_row(
        "SELECT id, content, creator, activity_id, date FROM comments WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            Ok(models::Comment {
                id: row.get(0)?,
                content: row.get(1)?,
                creator: row.get(2)?,
                activity_id: row.get(3)?,
                date: row.get(4)?,
            })
        },
    )
    .ok()
}

#[allow(clippy::too_many_arguments)]
fn notify_comment_event(
    state: &AppState,
    actor: &User,
    code: EventCode,
    comment_id: &str,
    content: &str,
    conversation_id: &str,
    conversation_name: &str,
    participants: &[String],
) {
    let data = EventData::new(
        MessageInfo {
            id: Some(comment_id.to_string()),
            content: content.to_string(),
        },
        ConversationInfo {
            id: conversation_id.to_string(),
            name: conversation_name.to_string(),
        },
        SenderInfo {
            id: actor.id.clone(),
            username: actor.username(),
        },
    );
    dispatch::notify_audience(&state.connections, participants, &actor.id, code, &data);
}
