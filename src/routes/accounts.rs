//! Connected account endpoints (/accounts/*)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::domain::accounts::{self, ConnectedAccount};
use crate::services::error::LogErr;
use super::auth::AuthUser;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts", get(list_accounts))
        .route("/accounts/{id}", delete(disconnect_account))
}

/// API shape for a connected account. Credentials never leave the service.
#[derive(Serialize)]
struct AccountResponse {
    id: i64,
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    follower_count: i64,
    following_count: i64,
    likes_count: i64,
    video_count: i64,
    is_active: bool,
    connected_at: DateTime<Utc>,
}

impl From<ConnectedAccount> for AccountResponse {
    fn from(a: ConnectedAccount) -> Self {
        AccountResponse {
            id: a.id,
            username: a.username,
            display_name: a.display_name,
            avatar_url: a.avatar_url,
            follower_count: a.follower_count,
            following_count: a.following_count,
            likes_count: a.likes_count,
            video_count: a.video_count,
            is_active: a.is_active,
            connected_at: a.created_at,
        }
    }
}

/// GET /accounts - List the user's connected accounts
async fn list_accounts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<AccountResponse>>, StatusCode> {
    let accounts = accounts::list_accounts_by_owner(&state.db, user_id)
        .await
        .log_500("List accounts error")?;

    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// DELETE /accounts/:id - Disconnect an account. Existing posts keep their
/// reference; publishing through it is rejected until reconnected.
async fn disconnect_account(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(account_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let deactivated = accounts::deactivate_account(&state.db, account_id, user_id)
        .await
        .log_500("Deactivate account error")?;

    if deactivated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
