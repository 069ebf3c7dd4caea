//! Authenticated-user extraction and the /me endpoint
//!
//! Session mechanics (login, cookies, token rotation) live in the gateway in
//! front of this service; requests arrive with the authenticated user id in
//! the `X-User-Id` header.

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::domain::users;
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(get_me))
}

/// Extractor that reads the authenticated user id from the `X-User-Id` header
pub struct AuthUser(pub i64);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser(user_id))
    }
}

#[derive(Serialize)]
struct MeResponse {
    id: i64,
    username: String,
}

/// GET /me - Get current user info
async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, StatusCode> {
    let user = users::get_user_by_id(&state.db, user_id)
        .await
        .log_500("Get user by ID error")?
        // A forwarded id for a deleted user is still unauthorized
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(MeResponse {
        id: user_id,
        username: user.username,
    }))
}
