use axum::{middleware, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::activities::{crud as activity_crud, membership};
use crate::auth::login;
use crate::auth::middleware::AuthContext;
use crate::comments::crud as comment_crud;
use crate::conversations::crud as conversation_crud;
use crate::pictures::crud as picture_crud;
use crate::state::AppState;
use crate::users::crud as user_crud;
use crate::ws::handler as ws_handler;

/// Inject the auth context into request extensions so the CurrentUser
/// extractor can validate tokens and load user rows.
async fn inject_auth_context(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut().insert(AuthContext {
        jwt_secret: state.jwt_secret.clone(),
        db: state.db.clone(),
    });
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 requests per minute per IP on the login endpoint.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5) // Allow burst of 5
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let auth_routes = Router::new()
        .route("/api/auth/login", axum::routing::post(login::login))
        .layer(GovernorLayer {
            config: governor_config,
        });

    let user_routes = Router::new()
        .route("/api/users", axum::routing::get(user_crud::list_users))
        .route("/api/users", axum::routing::post(user_crud::register))
        .route("/api/users/{id}", axum::routing::get(user_crud::get_user))
        .route(
            "/api/users/{id}/pictures",
            axum::routing::get(picture_crud::list_by_user),
        );

    let activity_routes = Router::new()
        .route(
            "/api/activities",
            axum::routing::get(activity_crud::list_activities),
        )
        .route(
            "/api/activities",
            axum::routing::post(activity_crud::create_activity),
        )
        .route(
            "/api/activities/joined",
            axum::routing::get(membership::list_joined),
        )
        .route(
            "/api/activities/{id}",
            axum::routing::get(activity_crud::get_activity),
        )
        .route(
            "/api/activities/{id}/join",
            axum::routing::post(membership::join_activity),
        )
        .route(
            "/api/activities/{id}/leave",
            axum::routing::delete(membership::leave_activity),
        )
        .route(
            "/api/activities/{id}/comments",
            axum::routing::get(comment_crud::list_comments),
        )
        .route(
            "/api/activities/{id}/comments",
            axum::routing::post(comment_crud::create_comment),
        )
        .route(
            "/api/activities/{id}/pictures",
            axum::routing::get(picture_crud::list_by_activity),
        )
        .route(
            "/api/activities/{id}/pictures",
            axum::routing::post(picture_crud::attach_picture),
        );

    let comment_routes = Router::new()
        .route(
            "/api/comments/{id}",
            axum::routing::patch(comment_crud::update_comment),
        )
        .route(
            "/api/comments/{id}",
            axum::routing::delete(comment_crud::delete_comment),
        );

    let conversation_routes = Router::new()
        .route(
            "/api/conversations",
            axum::routing::get(conversation_crud::list_conversations),
        )
        .route(
            "/api/conversations/activity/{id}",
            axum::routing::post(conversation_crud::create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            axum::routing::patch(conversation_crud::rename_conversation),
        )
        .route(
            "/api/conversations/{id}",
            axum::routing::delete(conversation_crud::delete_conversation),
        )
        .route(
            "/api/conversations/{id}/users",
            axum::routing::post(conversation_crud::add_user),
        );

    let picture_routes = Router::new().route(
        "/api/pictures/{id}",
        axum::routing::delete(picture_crud::delete_picture),
    );

    // WebSocket endpoint (auth via query param or Authorization header)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(user_routes)
        .merge(activity_routes)
        .merge(comment_routes)
        .merge(conversation_routes)
        .merge(picture_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_auth_context,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
