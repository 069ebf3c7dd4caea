//! Post endpoints (/posts/*)

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::domain::posts::{
    self, NewPost, Post, PostPatch, PostStatus, PrivacyLevel,
};
use crate::domain::accounts;
use crate::services::error::LogErr;
use super::auth::AuthUser;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/posts/{id}/publish", post(publish_post))
}

#[derive(Deserialize)]
struct ListPostsQuery {
    status: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
struct ListPostsResponse {
    posts: Vec<Post>,
    total: i64,
    has_more: bool,
}

/// GET /posts - List the user's posts, newest first, optionally filtered by
/// status
async fn list_posts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<ListPostsResponse>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    // An unknown status string is a client error, not a silent fallback
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => {
            Some(PostStatus::from_str(s).ok_or(StatusCode::UNPROCESSABLE_ENTITY)?)
        }
    };

    let total = posts::count_posts(&state.db, user_id, status)
        .await
        .log_500("Count posts error")?;

    let items = posts::list_posts_paginated(&state.db, user_id, status, limit, offset)
        .await
        .log_500("List posts error")?;

    let has_more = (offset + limit) < total;

    Ok(Json(ListPostsResponse {
        posts: items,
        total,
        has_more,
    }))
}

#[derive(Deserialize)]
struct CreatePostRequest {
    account_id: i64,
    title: String,
    description: Option<String>,
    #[serde(default)]
    hashtags: Vec<String>,
    video_url: String,
    thumbnail_url: Option<String>,
    privacy: Option<PrivacyLevel>,
    allow_comments: Option<bool>,
    allow_duet: Option<bool>,
    allow_stitch: Option<bool>,
    scheduled_at: Option<DateTime<Utc>>,
}

/// POST /posts - Create a post in draft (or scheduled, when a future schedule
/// time is supplied)
async fn create_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), StatusCode> {
    if req.title.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    if req.video_url.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    if let Some(at) = req.scheduled_at {
        if at <= Utc::now() {
            return Err(StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    // The target account must belong to the caller and still be connected
    let account = accounts::get_account_for_owner(&state.db, req.account_id, user_id)
        .await
        .log_500("Get account error")?
        .filter(|a| a.is_active)
        .ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;

    let new_post = NewPost {
        user_id,
        account_id: account.id,
        title: req.title,
        description: req.description,
        hashtags: req.hashtags,
        video_url: req.video_url,
        thumbnail_url: req.thumbnail_url,
        privacy: req.privacy.unwrap_or(PrivacyLevel::Public),
        allow_comments: req.allow_comments.unwrap_or(true),
        allow_duet: req.allow_duet.unwrap_or(true),
        allow_stitch: req.allow_stitch.unwrap_or(true),
        scheduled_at: req.scheduled_at,
    };

    let created = posts::create_post(&state.db, &new_post)
        .await
        .log_500("Create post error")?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /posts/:id - Get one post
async fn get_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Post>, StatusCode> {
    let post = posts::get_post_for_owner(&state.db, post_id, user_id)
        .await
        .log_500("Get post error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(post))
}

/// PATCH /posts/:id - Edit a post. Only draft, scheduled and failed posts are
/// editable; lifecycle fields are not touched here.
async fn update_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Post>, StatusCode> {
    let post = posts::get_post_for_owner(&state.db, post_id, user_id)
        .await
        .log_500("Get post error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    if !matches!(
        post.status,
        PostStatus::Draft | PostStatus::Scheduled | PostStatus::Failed
    ) {
        return Err(StatusCode::CONFLICT);
    }

    if let Some(title) = &patch.title {
        if title.trim().is_empty() {
            return Err(StatusCode::UNPROCESSABLE_ENTITY);
        }
    }
    if let Some(at) = patch.scheduled_at {
        if at <= Utc::now() {
            return Err(StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    let updated = posts::update_post(&state.db, post_id, user_id, &patch)
        .await
        .log_500("Update post error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(updated))
}

/// DELETE /posts/:id - Delete a post. A post mid-publish cannot be deleted.
async fn delete_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let post = posts::get_post_for_owner(&state.db, post_id, user_id)
        .await
        .log_500("Get post error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    if post.status == PostStatus::Posting {
        return Err(StatusCode::CONFLICT);
    }

    let deleted = posts::delete_post(&state.db, post_id, user_id)
        .await
        .log_500("Delete post error")?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// POST /posts/:id/publish - Publish a post now (also the retry path for
/// failed posts)
async fn publish_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Post>, StatusCode> {
    let published = state
        .publisher
        .publish(user_id, post_id)
        .await
        .map_err(|e| {
            eprintln!("Publish post {} error: {}", post_id, e);
            e.status_code()
        })?;

    Ok(Json(published))
}
