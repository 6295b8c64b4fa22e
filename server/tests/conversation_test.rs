//! Integration tests for conversation management and its admin gating.

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Helper: start the server on a random port.
/// Returns (base_url, db) — the pool lets tests promote a user to admin,
/// which the API deliberately has no endpoint for.
async fn start_test_server() -> (String, sport2meet_server::db::DbPool) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = sport2meet_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = sport2meet_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = sport2meet_server::state::AppState {
        db: db.clone(),
        jwt_secret,
        connections: Arc::new(sport2meet_server::ws::ConnectionRegistry::new()),
        token_ttl_days: 7,
    };

    let app = sport2meet_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), db)
}

async fn register_and_login(base_url: &str, email: &str, firstname: &str) -> (String, String) {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/users", base_url))
        .json(&json!({
            "email": email,
            "firstname": firstname,
            "lastname": "Girard",
            "password": "correct-horse-battery",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let user_id = body["id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&json!({ "email": email, "password": "correct-horse-battery" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    (user_id, body["token"].as_str().unwrap().to_string())
}

fn promote_to_admin(db: &sport2meet_server::db::DbPool, user_id: &str) {
    let conn = db.lock().unwrap();
    conn.execute(
        "UPDATE users SET role = 'admin' WHERE id = ?1",
        rusqlite::params![user_id],
    )
    .unwrap();
}

async fn create_activity(base_url: &str, token: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/activities", base_url))
        .bearer_auth(token)
        .json(&json!({
            "description": "Casual doubles",
            "sport": "Tennis",
            "address": "Centre sportif de la Vallée",
            "npa": 1005,
            "locality": "Lausanne",
            "players": 4,
            "datetime": "2026-10-03T14:00:00Z",
            "kind": "Autre",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_and_list_conversations() {
    let (base_url, _db) = start_test_server().await;
    let (user_id, token) = register_and_login(&base_url, "talk@example.com", "Tara").await;
    let activity_id = create_activity(&base_url, &token).await;

    let client = reqwest::Client::new();

    // Unknown activity
    let resp = client
        .post(format!(
            "{}/api/conversations/activity/{}",
            base_url, "no-such-activity"
        ))
        .bearer_auth(&token)
        .json(&json!({ "name": "Ghost chat" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Create, then the duplicate conflicts
    let resp = client
        .post(format!(
            "{}/api/conversations/activity/{}",
            base_url, activity_id
        ))
        .bearer_auth(&token)
        .json(&json!({ "name": "Doubles chat" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let conversation: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(conversation["users"], json!([user_id.as_str()]));

    let resp = client
        .post(format!(
            "{}/api/conversations/activity/{}",
            base_url, activity_id
        ))
        .bearer_auth(&token)
        .json(&json!({ "name": "Second chat" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = client
        .get(format!("{}/api/conversations", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let conversations: serde_json::Value = resp.json().await.unwrap();
    let conversations = conversations.as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["name"], "Doubles chat");
}

#[tokio::test]
async fn test_admin_gating() {
    let (base_url, db) = start_test_server().await;
    let (_owner_id, owner_token) =
        register_and_login(&base_url, "plain@example.com", "Paula").await;
    let (admin_id, admin_token) =
        register_and_login(&base_url, "chief@example.com", "Ciara").await;
    let (member_id, _member_token) =
        register_and_login(&base_url, "extra@example.com", "Egon").await;

    let activity_id = create_activity(&base_url, &owner_token).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!(
            "{}/api/conversations/activity/{}",
            base_url, activity_id
        ))
        .bearer_auth(&owner_token)
        .json(&json!({ "name": "Tennis talk" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let conversation: serde_json::Value = resp.json().await.unwrap();
    let conversation_id = conversation["id"].as_str().unwrap().to_string();

    // Ordinary users cannot rename, add members, or delete
    let resp = client
        .patch(format!("{}/api/conversations/{}", base_url, conversation_id))
        .bearer_auth(&owner_token)
        .json(&json!({ "name": "Renamed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .post(format!(
            "{}/api/conversations/{}/users",
            base_url, conversation_id
        ))
        .bearer_auth(&owner_token)
        .json(&json!({ "user": member_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .delete(format!("{}/api/conversations/{}", base_url, conversation_id))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Admins can
    promote_to_admin(&db, &admin_id);

    let resp = client
        .patch(format!("{}/api/conversations/{}", base_url, conversation_id))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "Renamed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!(
            "{}/api/conversations/{}/users",
            base_url, conversation_id
        ))
        .bearer_auth(&admin_token)
        .json(&json!({ "user": member_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Adding the same user again conflicts
    let resp = client
        .post(format!(
            "{}/api/conversations/{}/users",
            base_url, conversation_id
        ))
        .bearer_auth(&admin_token)
        .json(&json!({ "user": member_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = client
        .delete(format!("{}/api/conversations/{}", base_url, conversation_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
}
