//! Join/leave endpoints — the domain event producers for JOIN_ACTIVITY and
//! LEAVE_ACTIVITY notifications.
//!
//! Joining an activity also joins its conversation (when one exists) and
//! announces the membership change to every other participant. Delivery is
//! best-effort: the HTTP result reflects the committed mutation only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::middleware::CurrentUser;
use crate::db::models::{self, Conversation};
use crate::state::AppState;
use crate::ws::dispatch;
use crate::ws::events::{ConversationInfo, EventCode, EventData, MessageInfo, SenderInfo};

#[derive(Debug, Serialize)]
pub struct ActivityUserResponse {
    pub id: String,
    pub activity: String,
    pub user: String,
    pub inscription: String,
}

#[derive(Debug, Serialize)]
pub struct JoinedActivityResponse {
    pub activity: super::crud::ActivityResponse,
    pub inscription: String,
}

/// POST /api/activities/{id}/join — Enroll the caller in an activity.
/// 404 unknown activity, 409 when already enrolled. Other conversation
/// participants are notified with JOIN_ACTIVITY.
pub async fn join_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(activity_id): Path<String>,
) -> Result<(StatusCode, Json<ActivityUserResponse>), StatusCode> {
    let db = state.db.clone();
    let user_id = user.id.clone();
    let aid = activity_id.clone();

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

        let already_joined: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM activity_users WHERE activity_id = ?1 AND user_id = ?2",
                rusqlite::params![aid, user_id],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if already_joined {
            return Err(StatusCode::CONFLICT);
        }

        let id = Uuid::now_v7().to_string();
        let inscription = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO activity_users (id, activity_id, user_id, inscription)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, aid, user_id, inscription],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        // Join the activity's conversation when one exists
        let conversation = models::conversation_for_activity(&conn, &aid).map(|conv| {
            let _ = conn.execute(
                "INSERT OR IGNORE INTO conversation_users (conversation_id, user_id)
                 VALUES (?1, ?2)",
                rusqlite::params![conv.id, user_id],
            );
            let participants = models::conversation_participants(&conn, &conv.id);
            (conv, participants)
        });

        Ok::<_, StatusCode>((
            ActivityUserResponse {
                id,
                activity: aid,
                user: user_id,
                inscription,
            },
            conversation,
        ))
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    if let Some((conv, participants)) = conversation {
        announce(
            &state,
            &conv,
            &participants,
            &user,
            EventCode::JoinActivity,
            format!("{} joined the activity", user.username()),
        );
    }

    Ok((StatusCode::CREATED, Json(response)))
}

/// DELETE /api/activities/{id}/leave — Withdraw the caller from an
/// activity. 404 when not enrolled. Remaining conversation participants
/// are notified with LEAVE_ACTIVITY.
pub async fn leave_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(activity_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();
    let user_id = user.id.clone();
    let aid = activity_id.clone();

    let conversation = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let deleted = conn
            .execute(
                "DELETE FROM activity_users WHERE activity_id = ?1 AND user_id = ?2",
                rusqlite::params![aid, user_id],
            )
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if deleted == 0 {
            return Err(StatusCode::NOT_FOUND);
        }

        // Leave the conversation as well; the remaining participants form
        // the notification audience.
        let conversation = models::conversation_for_activity(&conn, &aid).map(|conv| {
            let _ = conn.execute(
                "DELETE FROM conversation_users WHERE conversation_id = ?1 AND user_id = ?2",
                rusqlite::params![conv.id, user_id],
            );
            let participants = models::conversation_participants(&conn, &conv.id);
            (conv, participants)
        });

        Ok::<_, StatusCode>(conversation)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    if let Some((conv, participants)) = conversation {
        announce(
            &state,
            &conv,
            &participants,
            &user,
            EventCode::LeaveActivity,
            format!("{} left the activity", user.username()),
        );
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/activities/joined — Activities the caller is enrolled in.
pub async fn list_joined(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<JoinedActivityResponse>>, StatusCode> {
    let db = state.db.clone();
    let user_id = user.id.clone();

    let joined = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let mut stmt = conn
            .prepare(
                "SELECT a.id, a.description, a.sport, a.address, a.npa, a.locality, a.players,
                        a.datetime, a.kind, a.creator, a.latitude, a.longitude, au.inscription
                 FROM activity_users au
                 JOIN activities a ON a.id = au.activity_id
                 WHERE au.user_id = ?1
                 ORDER BY au.inscription DESC",
            )
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let joined: Vec<JoinedActivityResponse> = stmt
            .query_map(rusqlite::params![user_id], |row| {
                Ok(JoinedActivityResponse {
                    activity: super::crud::ActivityResponse {
                        id: row.get(0)?,
                        description: row.get(1)?,
                        sport: row.get(2)?,
                        address: row.get(3)?,
                        npa: row.get(4)?,
                        locality: row.get(5)?,
                        players: row.get(6)?,
                        datetime: row.get(7)?,
                        kind: row.get(8)?,
                        creator: row.get(9)?,
                        latitude: row.get(10)?,
                        longitude: row.get(11)?,
                    },
                    inscription: row.get(12)?,
                })
            })
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .filter_map(|r| r.ok())
            .collect();

        Ok::<_, StatusCode>(joined)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(joined))
}

/// Push a membership announcement to every participant except the actor.
fn announce(
    state: &AppState,
    conv: &Conversation,
    participants: &[String],
    actor: &models::User,
    code: EventCode,
    content: String,
) {
    let data = EventData::new(
        MessageInfo { id: None, content },
        ConversationInfo {
            id: conv.id.clone(),
            name: conv.name.clone(),
        },
        SenderInfo {
            id: actor.id.clone(),
            username: actor.username(),
        },
    );
    dispatch::notify_audience(&state.connections, participants, &actor.id, code, &data);
}
