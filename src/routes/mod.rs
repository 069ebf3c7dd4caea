pub mod accounts;
pub mod analytics;
pub mod auth;
pub mod posts;
pub mod tiktok_oauth;
pub mod uploads;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(accounts::routes())
        .merge(analytics::routes())
        .merge(auth::routes())
        .merge(posts::routes())
        .merge(tiktok_oauth::routes())
        .merge(uploads::routes())
}

async fn health() -> &'static str {
    "ok"
}
