//! Analytics endpoints (/analytics/*)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::domain::analytics::{self, AnalyticsSummary, PostAnalytics};
use crate::services::error::LogErr;
use super::auth::AuthUser;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analytics/sync", post(sync_analytics))
        .route("/analytics/summary", get(get_summary))
        .route("/analytics/posts/{id}", get(get_post_analytics))
}

#[derive(Serialize)]
struct SyncResponse {
    message: String,
}

/// POST /analytics/sync - Pull fresh metrics from the platform for every
/// published post
async fn sync_analytics(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SyncResponse>, StatusCode> {
    let report = state
        .analytics
        .sync_analytics(user_id)
        .await
        .log_500("Analytics sync error")?;

    Ok(Json(SyncResponse {
        message: report.message(),
    }))
}

/// GET /analytics/summary - Aggregate totals across the user's tracked posts
async fn get_summary(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AnalyticsSummary>, StatusCode> {
    let summary = analytics::get_analytics_summary(&state.db, user_id)
        .await
        .log_500("Analytics summary error")?;

    Ok(Json(summary))
}

/// GET /analytics/posts/:id - Stored metrics for one post
async fn get_post_analytics(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<PostAnalytics>, StatusCode> {
    let row = analytics::get_analytics_for_post(&state.db, post_id, user_id)
        .await
        .log_500("Get post analytics error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(row))
}
