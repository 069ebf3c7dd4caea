//! Post domain - models and DB queries for scheduled/published posts
//!
//! All query functions use the generic Executor pattern, allowing them to work
//! with both `&PgPool` (for standalone queries) and `&mut PgConnection` (for
//! transactions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Executor, Postgres, Type};

/// Post lifecycle status.
///
/// `posted` is terminal; `failed` is retriable (a retry re-enters `posting`).
/// Lifecycle transitions happen only through the guarded queries below, never
/// through generic updates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Posting,
    Posted,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Posting => "posting",
            PostStatus::Posted => "posted",
            PostStatus::Failed => "failed",
        }
    }

    /// Lifecycle state never falls back silently; an unrecognized value is
    /// the caller's (or the database's) problem to surface.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PostStatus::Draft),
            "scheduled" => Some(PostStatus::Scheduled),
            "posting" => Some(PostStatus::Posting),
            "posted" => Some(PostStatus::Posted),
            "failed" => Some(PostStatus::Failed),
            _ => None,
        }
    }
}

// sqlx Type/Decode/Encode over TEXT to enable FromRow on Post
impl Type<Postgres> for PostStatus {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for PostStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        PostStatus::from_str(&s).ok_or_else(|| format!("unknown post status: {}", s).into())
    }
}

impl Encode<'_, Postgres> for PostStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

/// Audience for a published video, as chosen in the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Public,
    Friends,
    Private,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::Friends => "friends",
            PrivacyLevel::Private => "private",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "public" => PrivacyLevel::Public,
            "friends" => PrivacyLevel::Friends,
            "private" => PrivacyLevel::Private,
            _ => PrivacyLevel::Public,
        }
    }
}

impl Type<Postgres> for PrivacyLevel {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for PrivacyLevel {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        Ok(PrivacyLevel::from_str(&s))
    }
}

impl Encode<'_, Postgres> for PrivacyLevel {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

/// A schedulable/publishable video post.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub hashtags: Vec<String>,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub status: PostStatus,
    pub privacy: PrivacyLevel,
    pub allow_comments: bool,
    pub allow_duet: bool,
    pub allow_stitch: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
    pub remote_post_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a post via the intake path.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub account_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub hashtags: Vec<String>,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub privacy: PrivacyLevel,
    pub allow_comments: bool,
    pub allow_duet: bool,
    pub allow_stitch: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewPost {
    /// Posts enter the lifecycle as `draft`, or `scheduled` when a schedule
    /// time is supplied.
    pub fn initial_status(&self) -> PostStatus {
        if self.scheduled_at.is_some() {
            PostStatus::Scheduled
        } else {
            PostStatus::Draft
        }
    }
}

/// Partial update applied by the edit path. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub hashtags: Option<Vec<String>>,
    pub thumbnail_url: Option<String>,
    pub privacy: Option<PrivacyLevel>,
    pub allow_comments: Option<bool>,
    pub allow_duet: Option<bool>,
    pub allow_stitch: Option<bool>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

const POST_COLUMNS: &str = "id, user_id, account_id, title, description, hashtags, video_url, \
     thumbnail_url, status, privacy, allow_comments, allow_duet, allow_stitch, \
     scheduled_at, posted_at, remote_post_id, error_message, created_at, updated_at";

/// Get a post by ID regardless of owner (orchestrator path; ownership is
/// checked by the caller against `user_id`)
pub async fn get_post<'e, E>(executor: E, post_id: i64) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
        .bind(post_id)
        .fetch_optional(executor)
        .await
}

/// Get a post by ID, scoped to its owner
pub async fn get_post_for_owner<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND user_id = $2"
    ))
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Create a post in `draft` or `scheduled` status
pub async fn create_post<'e, E>(executor: E, new_post: &NewPost) -> Result<Post, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        INSERT INTO posts (user_id, account_id, title, description, hashtags, video_url,
                           thumbnail_url, status, privacy, allow_comments, allow_duet,
                           allow_stitch, scheduled_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(new_post.user_id)
    .bind(new_post.account_id)
    .bind(&new_post.title)
    .bind(&new_post.description)
    .bind(&new_post.hashtags)
    .bind(&new_post.video_url)
    .bind(&new_post.thumbnail_url)
    .bind(new_post.initial_status())
    .bind(new_post.privacy)
    .bind(new_post.allow_comments)
    .bind(new_post.allow_duet)
    .bind(new_post.allow_stitch)
    .bind(new_post.scheduled_at)
    .fetch_one(executor)
    .await
}

/// Apply a partial update to a post. Lifecycle fields (status, remote id,
/// posted_at, error_message) are not editable here.
pub async fn update_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
    patch: &PostPatch,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        UPDATE posts SET
            title = COALESCE($3, title),
            description = COALESCE($4, description),
            hashtags = COALESCE($5, hashtags),
            thumbnail_url = COALESCE($6, thumbnail_url),
            privacy = COALESCE($7, privacy),
            allow_comments = COALESCE($8, allow_comments),
            allow_duet = COALESCE($9, allow_duet),
            allow_stitch = COALESCE($10, allow_stitch),
            scheduled_at = COALESCE($11, scheduled_at),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(post_id)
    .bind(user_id)
    .bind(&patch.title)
    .bind(&patch.description)
    .bind(&patch.hashtags)
    .bind(&patch.thumbnail_url)
    .bind(patch.privacy)
    .bind(patch.allow_comments)
    .bind(patch.allow_duet)
    .bind(patch.allow_stitch)
    .bind(patch.scheduled_at)
    .fetch_optional(executor)
    .await
}

/// Delete a post. Returns true if a row was deleted.
pub async fn delete_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Count posts for pagination, optionally filtered by status
pub async fn count_posts<'e, E>(
    executor: E,
    user_id: i64,
    status: Option<PostStatus>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM posts WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)",
    )
    .bind(user_id)
    .bind(status.map(|s| s.as_str()))
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// List a user's posts with pagination, newest first, optionally filtered by
/// status
pub async fn list_posts_paginated<'e, E>(
    executor: E,
    user_id: i64,
    status: Option<PostStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(user_id)
    .bind(status.map(|s| s.as_str()))
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

/// List all of a user's posts in stable id order
pub async fn list_posts_by_owner<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Vec<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE user_id = $1 ORDER BY id"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// List published posts that carry a remote post id, in stable id order
/// (the reconciler's sweep input)
pub async fn list_posted_with_remote_id<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Vec<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE user_id = $1 AND status = 'posted' AND remote_post_id IS NOT NULL
        ORDER BY id
        "#
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// List scheduled posts whose schedule time has passed
pub async fn list_due_scheduled<'e, E>(
    executor: E,
    now: DateTime<Utc>,
) -> Result<Vec<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE status = 'scheduled' AND scheduled_at <= $1
        ORDER BY scheduled_at, id
        "#
    ))
    .bind(now)
    .fetch_all(executor)
    .await
}

/// Transition a post to `posting` (atomic compare-and-set - only succeeds
/// from `draft`, `scheduled` or `failed`).
/// Returns true if the transition was applied.
pub async fn begin_posting<'e, E>(executor: E, post_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET status = 'posting', updated_at = NOW()
        WHERE id = $1 AND status IN ('draft', 'scheduled', 'failed')
        "#,
    )
    .bind(post_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark a post as published, recording the remote post id and clearing any
/// previous failure
pub async fn mark_post_posted<'e, E>(
    executor: E,
    post_id: i64,
    remote_post_id: &str,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        UPDATE posts
        SET status = 'posted', remote_post_id = $2, posted_at = NOW(),
            error_message = NULL, updated_at = NOW()
        WHERE id = $1
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(post_id)
    .bind(remote_post_id)
    .fetch_optional(executor)
    .await
}

/// Mark a post as failed with a human-readable reason. The remote post id is
/// left untouched (unset for first-time failures).
pub async fn mark_post_failed<'e, E>(
    executor: E,
    post_id: i64,
    message: &str,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        UPDATE posts
        SET status = 'failed', error_message = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(post_id)
    .bind(message)
    .fetch_optional(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            PostStatus::Draft,
            PostStatus::Scheduled,
            PostStatus::Posting,
            PostStatus::Posted,
            PostStatus::Failed,
        ] {
            assert_eq!(PostStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_eq!(PostStatus::from_str("bogus"), None);
        assert_eq!(PostStatus::from_str(""), None);
    }

    #[test]
    fn privacy_round_trips() {
        for privacy in [
            PrivacyLevel::Public,
            PrivacyLevel::Friends,
            PrivacyLevel::Private,
        ] {
            assert_eq!(PrivacyLevel::from_str(privacy.as_str()), privacy);
        }
    }

    #[test]
    fn initial_status_follows_schedule_time() {
        let mut new_post = NewPost {
            user_id: 1,
            account_id: 1,
            title: "t".to_string(),
            description: None,
            hashtags: vec![],
            video_url: "https://cdn.example.com/v.mp4".to_string(),
            thumbnail_url: None,
            privacy: PrivacyLevel::Public,
            allow_comments: true,
            allow_duet: true,
            allow_stitch: true,
            scheduled_at: None,
        };
        assert_eq!(new_post.initial_status(), PostStatus::Draft);

        new_post.scheduled_at = Some(Utc::now() + chrono::Duration::hours(1));
        assert_eq!(new_post.initial_status(), PostStatus::Scheduled);
    }
}
