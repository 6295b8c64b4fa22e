use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use serde::{Deserialize, Serialize};

use crate::db::models::{self, User};
use crate::db::DbPool;

/// JWT claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (UUIDv7)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Authentication context stored in request extensions for the CurrentUser
/// extractor (set by middleware layer in routes.rs).
#[derive(Clone)]
pub struct AuthContext {
    pub jwt_secret: Vec<u8>,
    pub db: DbPool,
}

/// Authenticated user extracted from the Authorization: Bearer header.
/// Validates the token and loads the user row; any failure short-circuits
/// the request with 401 and the downstream handler never runs. A token
/// whose subject row has been deleted is rejected the same way.
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Extract Bearer token from Authorization header
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let ctx = parts
            .extensions
            .get::<AuthContext>()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

        // Validate and decode JWT
        let validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(&ctx.jwt_secret),
            &validation,
        )
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

        // The subject must still reference a live user row
        let db = ctx.db.clone();
        let user_id = token_data.claims.sub;
        let user = tokio::task::spawn_blocking(move || {
            let conn = db.lock().ok()?;
            models::find_user_by_id(&conn, &user_id)
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(CurrentUser(user))
    }
}
