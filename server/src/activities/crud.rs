//! REST endpoints for activity CRUD.
//!
//! Creating an activity auto-enrolls the creator, so a fresh activity is
//! never participant-less.

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

/// Accepted sport values, carried over from the original platform.
pub const SPORTS: &[&str] = &[
    "Course",
    "Vélo",
    "Natation",
    "Randonnée",
    "Ski",
    "Football",
    "Basketball",
    "Tennis",
    "Volleyball",
    "Baseball",
    "Football-American",
    "Golf",
    "Hockey",
    "Rugby",
    "Boxe",
    "Arts Martiaux",
    "Yoga",
    "Pilates",
    "Dance",
    "Fitness",
    "Crossfit",
    "Autre",
];

/// Accepted activity kinds.
pub const KINDS: &[&str] = &["Evénement", "Tournoi", "Entraînement", "Autre"];

#[derive(Debug, Deserialize)]
pub struct CreateActivityRequest {
    pub description: String,
    pub sport: String,
    pub address: String,
    pub npa: i64,
    pub locality: String,
    pub players: i64,
    pub datetime: String,
    pub kind: String,
    // Coordinates are client-supplied; there is no server-side geocoding.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub id: String,
    pub description: String,
    pub sport: String,
    pub address: String,
    pub npa: i64,
    pub locality: String,
    pub players: i64,
    pub datetime: String,
    pub kind: String,
    pub creator: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// POST /api/activities — Create an activity. JWT auth required.
/// Sport and kind must come from the fixed lists; 422 otherwise.
pub async fn create_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<ActivityResponse>), StatusCode> {
    if !SPORTS.contains(&body.sport.as_str()) || !KINDS.contains(&body.kind.as_str()) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    if body.description.trim().is_empty() || body.players < 1 {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let db = state.db.clone();
    let creator = user.id.clone();

    let response = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let id = Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO activities
                 (id, description, sport, address, npa, locality, players, datetime, kind,
                  creator, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                id,
                body.description,
                body.sport,
                body.address,
                body.npa,
                body.locality,
                body.players,
                body.datetime,
                body.kind,
                creator,
                body.latitude,
                body.longitude,
            ],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        // The creator joins their own activity immediately
        let enrollment_id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO activity_users (id, activity_id, user_id, inscription)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![enrollment_id, id, creator, now],
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok::<_, StatusCode>(ActivityResponse {
            id,
            description: body.description,
            sport: body.sport,
            address: body.address,
            npa: body.npa,
            locality: body.locality,
            players: body.players,
            datetime: body.datetime,
            kind: body.kind,
            creator,
            latitude: body.latitude,
            longitude: body.longitude,
        })
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/activities — List activities, sorted by sport.
pub async fn list_activities(
    State(state): State<AppState>,
) -> Result<Json<Vec<ActivityResponse>>, StatusCode> {
    let db = state.db.clone();

    let activities = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, description, sport, address, npa, locality, players, datetime, kind,
                        creator, latitude, longitude
                 FROM activities ORDER BY sport",
            )
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let activities: Vec<ActivityResponse> = stmt
            .query_map([], map_activity_row)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .filter_map(|r| r.ok())
            .collect();

        Ok::<_, StatusCode>(activities)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(activities))
}

/// GET /api/activities/{id} — Fetch one activity. 404 when absent.
pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActivityResponse>, StatusCode> {
    let db = state.db.clone();

    let activity = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        conn.query_row(
            "SELECT id, description, sport, address, npa, locality, players, datetime, kind,
                    creator, latitude, longitude
             FROM activities WHERE id = ?1",
            rusqlite::params![id],
            map_activity_row,
        )
        .map_err(|_| StatusCode::NOT_FOUND)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(activity))
}

fn map_activity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityResponse> {
    Ok(ActivityResponse {
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
    })
}
