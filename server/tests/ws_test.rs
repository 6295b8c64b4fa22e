//! Integration tests for the WebSocket gateway: handshake auth, rejection
//! behavior, echo handling, malformed-frame tolerance, and targeted
//! notification delivery driven by the HTTP endpoints.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Helper: start the server on a random port.
/// Returns (base_url, addr, registry) — the registry handle lets tests
/// observe exactly who is online.
async fn start_test_server() -> (
    String,
    SocketAddr,
    Arc<sport2meet_server::ws::ConnectionRegistry>,
) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = sport2meet_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = sport2meet_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let connections = Arc::new(sport2meet_server::ws::ConnectionRegistry::new());
    let state = sport2meet_server::state::AppState {
        db,
        jwt_secret,
        connections: connections.clone(),
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

    let base_url = format!("http://{}", addr);
    (base_url, addr, connections)
}

/// Register a user and log in. Returns (user_id, access_token).
async fn register_and_login(base_url: &str, email: &str, firstname: &str) -> (String, String) {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/users", base_url))
        .json(&json!({
            "email": email,
            "firstname": firstname,
            "lastname": "Tester",
            "password": "correct-horse-battery",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "Registration failed for {}", email);
    let body: serde_json::Value = resp.json().await.unwrap();
    let user_id = body["id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&json!({ "email": email, "password": "correct-horse-battery" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "Login failed for {}", email);
    let body: serde_json::Value = resp.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    (user_id, token)
}

/// Create an activity (creator is auto-enrolled) and its conversation.
/// Returns (activity_id, conversation_id).
async fn create_activity_with_conversation(base_url: &str, token: &str) -> (String, String) {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/activities", base_url))
        .bearer_auth(token)
        .json(&json!({
            "description": "Evening 10k along the lake",
            "sport": "Course",
            "address": "Quai d'Ouchy",
            "npa": 1006,
            "locality": "Lausanne",
            "players": 8,
            "datetime": "2026-09-01T18:00:00Z",
            "kind": "Entraînement",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let activity_id = body["id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!(
            "{}/api/conversations/activity/{}",
            base_url, activity_id
        ))
        .bearer_auth(token)
        .json(&json!({ "name": "Evening 10k" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let conversation_id = body["id"].as_str().unwrap().to_string();

    (activity_id, conversation_id)
}

async fn ws_connect(addr: &SocketAddr, token: &str) -> WsStream {
    let ws_url = format!("ws://{}/ws?token={}", addr, token);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Read the next text frame as JSON within a timeout.
async fn next_json_frame(
    read: &mut futures_util::stream::SplitStream<WsStream>,
) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected frame within timeout");
    match msg {
        Some(Ok(Message::Text(text))) => {
            serde_json::from_str(text.as_str()).expect("frame should be JSON")
        }
        other => panic!("Expected text frame, got: {:?}", other),
    }
}

/// Assert nothing arrives on this stream for a short window.
async fn assert_silent(read: &mut futures_util::stream::SplitStream<WsStream>) {
    let result = tokio::time::timeout(Duration::from_millis(300), read.next()).await;
    assert!(result.is_err(), "Expected no frame, got: {:?}", result);
}

#[tokio::test]
async fn test_ws_connection_with_valid_token() {
    let (base_url, addr, registry) = start_test_server().await;
    let (user_id, token) = register_and_login(&base_url, "ws1@example.com", "Alice").await;

    let ws_stream = ws_connect(&addr, &token).await;
    let (mut write, mut read) = ws_stream.split();

    // Connection stays open with no unsolicited frames
    assert_silent(&mut read).await;
    assert!(registry.find(&user_id).is_some(), "user should be online");

    // A valid JSON frame gets an echo acknowledgement
    write
        .send(Message::Text(r#"{"hello":"world"}"#.into()))
        .await
        .expect("Failed to send frame");
    let frame = next_json_frame(&mut read).await;
    assert_eq!(frame["echo"]["hello"], "world");
}

#[tokio::test]
async fn test_ws_cleanup_on_disconnect() {
    let (base_url, addr, registry) = start_test_server().await;
    let (user_id, token) = register_and_login(&base_url, "brief@example.com", "Bruno").await;

    let ws_stream = ws_connect(&addr, &token).await;
    let (mut write, _read) = ws_stream.split();

    // Wait for registration, then close from the client side
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(registry.find(&user_id).is_some());

    write.send(Message::Close(None)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The entry is gone; the user appears offline again
    assert!(registry.find(&user_id).is_none());
    assert_eq!(registry.online_count(), 0);

    // Reconnecting starts a fresh cycle
    let _ws_stream = ws_connect(&addr, &token).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(registry.find(&user_id).is_some());
}

#[tokio::test]
async fn test_ws_rejects_invalid_token() {
    let (_base_url, addr, registry) = start_test_server().await;

    let ws_url = format!("ws://{}/ws?token=not_a_jwt", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WebSocket should upgrade even with an invalid token");
    let (mut _write, mut read) = ws_stream.split();

    // Rejection text first, then the connection closes
    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected rejection within timeout");
    match msg {
        Some(Ok(Message::Text(text))) => {
            assert_eq!(text.as_str(), "User not authenticated");
        }
        other => panic!("Expected rejection text, got: {:?}", other),
    }

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected close within timeout");
    match msg {
        Some(Ok(msg)) => assert!(msg.is_close(), "Expected close, got: {:?}", msg),
        None | Some(Err(_)) => {} // Stream ended — also a closed connection
    }

    // The rejected connection never appeared in the registry
    assert_eq!(registry.online_count(), 0);
}

#[tokio::test]
async fn test_ws_rejects_missing_token() {
    let (_base_url, addr, _registry) = start_test_server().await;

    let ws_url = format!("ws://{}/ws", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WebSocket should upgrade without a token");
    let (mut _write, mut read) = ws_stream.split();

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected rejection within timeout");
    match msg {
        Some(Ok(Message::Text(text))) => {
            assert_eq!(text.as_str(), "User not authenticated");
        }
        other => panic!("Expected rejection text, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_ping_pong() {
    let (base_url, addr, _registry) = start_test_server().await;
    let (_user_id, token) = register_and_login(&base_url, "ping@example.com", "Penny").await;

    let ws_stream = ws_connect(&addr, &token).await;
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Ping(vec![42, 43, 44].into()))
        .await
        .expect("Failed to send ping");

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected pong within timeout");
    match msg {
        Some(Ok(Message::Pong(data))) => {
            assert_eq!(data.as_ref(), &[42, 43, 44], "Pong data should match ping");
        }
        other => panic!("Expected Pong message, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_malformed_frame_keeps_connection_open() {
    let (base_url, addr, _registry) = start_test_server().await;
    let (_user_id, token) = register_and_login(&base_url, "garbled@example.com", "Grace").await;

    let ws_stream = ws_connect(&addr, &token).await;
    let (mut write, mut read) = ws_stream.split();

    // Malformed payload: logged and dropped, no response, no close
    write
        .send(Message::Text("this is not json {".into()))
        .await
        .expect("Failed to send malformed frame");
    assert_silent(&mut read).await;

    // A following well-formed frame is still processed
    write
        .send(Message::Text(r#"{"still":"alive"}"#.into()))
        .await
        .expect("Failed to send valid frame");
    let frame = next_json_frame(&mut read).await;
    assert_eq!(frame["echo"]["still"], "alive");
}

#[tokio::test]
async fn test_join_notifies_participants_not_the_actor() {
    let (base_url, addr, _registry) = start_test_server().await;
    let (_creator_id, creator_token) =
        register_and_login(&base_url, "creator@example.com", "Clara").await;
    let (joiner_id, joiner_token) =
        register_and_login(&base_url, "joiner@example.com", "Jonas").await;

    let (activity_id, conversation_id) =
        create_activity_with_conversation(&base_url, &creator_token).await;

    // Both users online; registration completes shortly after the upgrade
    let (_creator_write, mut creator_read) = ws_connect(&addr, &creator_token).await.split();
    let (_joiner_write, mut joiner_read) = ws_connect(&addr, &joiner_token).await.split();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Joiner enrolls via HTTP — the creator is the audience
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/activities/{}/join", base_url, activity_id))
        .bearer_auth(&joiner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let frame = next_json_frame(&mut creator_read).await;
    assert_eq!(frame["code"], "JOIN_ACTIVITY");
    assert_eq!(frame["message"]["conversation"]["id"], conversation_id.as_str());
    assert_eq!(frame["message"]["sender"]["id"], joiner_id.as_str());
    assert_eq!(
        frame["message"]["message"]["content"],
        "Jonas Tester joined the activity"
    );

    // Exactly one frame to the creator, none to the actor
    assert_silent(&mut creator_read).await;
    assert_silent(&mut joiner_read).await;
}

#[tokio::test]
async fn test_reconnect_last_registration_wins() {
    let (base_url, addr, _registry) = start_test_server().await;
    let (_creator_id, creator_token) =
        register_and_login(&base_url, "multi@example.com", "Meryl").await;
    let (_joiner_id, joiner_token) =
        register_and_login(&base_url, "walker@example.com", "Willa").await;

    let (activity_id, _conversation_id) =
        create_activity_with_conversation(&base_url, &creator_token).await;

    // The creator connects twice; the second registration wins. The pause
    // between connects pins the registration order.
    let (mut old_write, mut old_read) = ws_connect(&addr, &creator_token).await.split();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (_new_write, mut new_read) = ws_connect(&addr, &creator_token).await.split();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/activities/{}/join", base_url, activity_id))
        .bearer_auth(&joiner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let frame = next_json_frame(&mut new_read).await;
    assert_eq!(frame["code"], "JOIN_ACTIVITY");
    assert_silent(&mut old_read).await;

    // Closing the old connection must not evict the newer registration
    old_write.send(Message::Close(None)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = client
        .delete(format!("{}/api/activities/{}/leave", base_url, activity_id))
        .bearer_auth(&joiner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let frame = next_json_frame(&mut new_read).await;
    assert_eq!(frame["code"], "LEAVE_ACTIVITY");
    assert_eq!(
        frame["message"]["message"]["content"],
        "Willa Tester left the activity"
    );
}
