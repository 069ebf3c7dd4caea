//! Post analytics domain - engagement metrics reconciled from the platform
//!
//! Rows here are written only by the analytics reconciler via upsert; the rest
//! of the application reads them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Postgres};

/// Stored engagement metrics for a single post (one-to-one, keyed by post id).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PostAnalytics {
    pub post_id: i64,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub average_watch_time_ms: i64,
    pub total_play_time_ms: i64,
    pub profile_views: i64,
    pub updated_at: DateTime<Utc>,
}

/// Metric fields written by an upsert. The timestamp is set by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsUpdate {
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub average_watch_time_ms: i64,
    pub total_play_time_ms: i64,
    pub profile_views: i64,
}

/// Per-user aggregate totals for the dashboard overview.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AnalyticsSummary {
    pub posts_tracked: i64,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_shares: i64,
}

/// Insert metrics for a post, or overwrite the numeric fields and timestamp
/// if a row already exists
pub async fn upsert_post_analytics<'e, E>(
    executor: E,
    post_id: i64,
    update: &AnalyticsUpdate,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO post_analytics (post_id, view_count, like_count, comment_count,
                                    share_count, average_watch_time_ms, total_play_time_ms,
                                    profile_views, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        ON CONFLICT (post_id) DO UPDATE SET
            view_count = $2,
            like_count = $3,
            comment_count = $4,
            share_count = $5,
            average_watch_time_ms = $6,
            total_play_time_ms = $7,
            profile_views = $8,
            updated_at = NOW()
        "#,
    )
    .bind(post_id)
    .bind(update.view_count)
    .bind(update.like_count)
    .bind(update.comment_count)
    .bind(update.share_count)
    .bind(update.average_watch_time_ms)
    .bind(update.total_play_time_ms)
    .bind(update.profile_views)
    .execute(executor)
    .await?;
    Ok(())
}

/// Get the analytics row for a post, scoped to the post's owner
pub async fn get_analytics_for_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
) -> Result<Option<PostAnalytics>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT a.post_id, a.view_count, a.like_count, a.comment_count, a.share_count,
               a.average_watch_time_ms, a.total_play_time_ms, a.profile_views, a.updated_at
        FROM post_analytics a
        JOIN posts p ON p.id = a.post_id
        WHERE a.post_id = $1 AND p.user_id = $2
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Aggregate engagement totals across all of a user's tracked posts
pub async fn get_analytics_summary<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<AnalyticsSummary, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT COUNT(a.post_id) AS posts_tracked,
               COALESCE(SUM(a.view_count), 0)::BIGINT AS total_views,
               COALESCE(SUM(a.like_count), 0)::BIGINT AS total_likes,
               COALESCE(SUM(a.comment_count), 0)::BIGINT AS total_comments,
               COALESCE(SUM(a.share_count), 0)::BIGINT AS total_shares
        FROM post_analytics a
        JOIN posts p ON p.id = a.post_id
        WHERE p.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
}
