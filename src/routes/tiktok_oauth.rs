//! TikTok OAuth endpoints (/auth/tiktok/*)

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use crate::AppState;
use crate::domain::accounts::{self, AccountProfile};
use crate::services::{error::LogErr, tiktok};
use super::auth::AuthUser;

pub fn routes() -> Router<Arc<AppState>> {
    // Rate limit: stricter for OAuth - burst of 5, then 1 per 12 seconds
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(12)
        .burst_size(5)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/auth/tiktok", get(auth_tiktok))
        .route("/auth/tiktok/callback", post(auth_tiktok_callback))
        .layer(rate_limit_layer)
}

#[derive(Serialize)]
struct AuthUrlResponse {
    url: String,
}

/// GET /auth/tiktok - Start the connect flow, returns URL to redirect user to
async fn auth_tiktok(
    State(state): State<Arc<AppState>>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<AuthUrlResponse>, StatusCode> {
    let auth_request = state.tiktok.get_authorize_url(&[
        "user.info.basic",
        "user.info.stats",
        "video.publish",
        "video.list",
    ]);

    // Store state and code_verifier for the callback
    tiktok::save_oauth_state(&state.db, &auth_request.state, &auth_request.code_verifier)
        .await
        .log_500("Save OAuth state error")?;

    Ok(Json(AuthUrlResponse {
        url: auth_request.url,
    }))
}

#[derive(Deserialize)]
struct CallbackRequest {
    code: String,
    state: String,
}

#[derive(Serialize)]
struct CallbackResponse {
    account_id: i64,
    username: String,
}

/// POST /auth/tiktok/callback - Exchange the OAuth code and connect (or
/// refresh) the account
async fn auth_tiktok_callback(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<CallbackRequest>,
) -> Result<Json<CallbackResponse>, StatusCode> {
    // Unknown or expired state means the flow was not started here
    let code_verifier = tiktok::get_oauth_state(&state.db, &req.state)
        .await
        .log_500("Get OAuth state error")?
        .ok_or(StatusCode::BAD_REQUEST)?;

    let token_response = state
        .tiktok
        .exchange_code(&req.code, &code_verifier)
        .await
        .log_status("Code exchange error", StatusCode::BAD_GATEWAY)?;

    let info = state
        .platform
        .fetch_account_info(&token_response.access_token)
        .await
        .log_status("Fetch account info error", StatusCode::BAD_GATEWAY)?;

    let profile = AccountProfile {
        remote_user_id: info.remote_user_id,
        username: info.username.clone(),
        display_name: info.display_name,
        avatar_url: info.avatar_url,
        follower_count: info.follower_count,
        following_count: info.following_count,
        likes_count: info.likes_count,
        video_count: info.video_count,
    };

    let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);

    let account_id = accounts::upsert_account(
        &state.db,
        user_id,
        &profile,
        &token_response.access_token,
        token_response.refresh_token.as_deref(),
        expires_at,
    )
    .await
    .log_500("Upsert account error")?;

    println!(
        "[oauth] Connected account {} (@{}) for user {}",
        account_id, info.username, user_id
    );

    Ok(Json(CallbackResponse {
        account_id,
        username: info.username,
    }))
}
