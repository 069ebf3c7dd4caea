//! Store traits consumed by the publish orchestrator and analytics reconciler.
//!
//! The orchestration layer talks to durable state through these traits rather
//! than `PgPool` directly, so the state machine can be exercised against an
//! in-memory store in tests. `PgStore` is the production backend; it delegates
//! to the Executor-generic query functions in the sibling domain modules.
//!
//! Error type is `sqlx::Error` throughout: the production backend is Postgres
//! end to end, and the in-memory store simply never fails.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::accounts::{self, ConnectedAccount};
use super::analytics::{self, AnalyticsUpdate};
use super::posts::{self, NewPost, Post, PostPatch};

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get(&self, post_id: i64) -> Result<Option<Post>, sqlx::Error>;
    async fn create(&self, new_post: &NewPost) -> Result<Post, sqlx::Error>;
    async fn update(
        &self,
        post_id: i64,
        user_id: i64,
        patch: &PostPatch,
    ) -> Result<Option<Post>, sqlx::Error>;
    async fn delete(&self, post_id: i64, user_id: i64) -> Result<bool, sqlx::Error>;
    async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Post>, sqlx::Error>;
    /// Published posts carrying a remote post id, in stable id order.
    async fn list_posted_by_owner(&self, user_id: i64) -> Result<Vec<Post>, sqlx::Error>;
    async fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>, sqlx::Error>;
    /// Compare-and-set transition to `posting`; false means the post was not
    /// in a publishable state.
    async fn begin_posting(&self, post_id: i64) -> Result<bool, sqlx::Error>;
    async fn mark_posted(
        &self,
        post_id: i64,
        remote_post_id: &str,
    ) -> Result<Option<Post>, sqlx::Error>;
    async fn mark_failed(&self, post_id: i64, message: &str)
    -> Result<Option<Post>, sqlx::Error>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, account_id: i64) -> Result<Option<ConnectedAccount>, sqlx::Error>;
    async fn update_tokens(
        &self,
        account_id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Insert-if-absent, else overwrite numeric fields and timestamp.
    async fn upsert(&self, post_id: i64, update: &AnalyticsUpdate) -> Result<(), sqlx::Error>;
}

/// Postgres-backed store used in production.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn get(&self, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
        posts::get_post(&self.db, post_id).await
    }

    async fn create(&self, new_post: &NewPost) -> Result<Post, sqlx::Error> {
        posts::create_post(&self.db, new_post).await
    }

    async fn update(
        &self,
        post_id: i64,
        user_id: i64,
        patch: &PostPatch,
    ) -> Result<Option<Post>, sqlx::Error> {
        posts::update_post(&self.db, post_id, user_id, patch).await
    }

    async fn delete(&self, post_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        posts::delete_post(&self.db, post_id, user_id).await
    }

    async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Post>, sqlx::Error> {
        posts::list_posts_by_owner(&self.db, user_id).await
    }

    async fn list_posted_by_owner(&self, user_id: i64) -> Result<Vec<Post>, sqlx::Error> {
        posts::list_posted_with_remote_id(&self.db, user_id).await
    }

    async fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>, sqlx::Error> {
        posts::list_due_scheduled(&self.db, now).await
    }

    async fn begin_posting(&self, post_id: i64) -> Result<bool, sqlx::Error> {
        posts::begin_posting(&self.db, post_id).await
    }

    async fn mark_posted(
        &self,
        post_id: i64,
        remote_post_id: &str,
    ) -> Result<Option<Post>, sqlx::Error> {
        posts::mark_post_posted(&self.db, post_id, remote_post_id).await
    }

    async fn mark_failed(
        &self,
        post_id: i64,
        message: &str,
    ) -> Result<Option<Post>, sqlx::Error> {
        posts::mark_post_failed(&self.db, post_id, message).await
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get(&self, account_id: i64) -> Result<Option<ConnectedAccount>, sqlx::Error> {
        accounts::get_account(&self.db, account_id).await
    }

    async fn update_tokens(
        &self,
        account_id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        accounts::update_account_tokens(&self.db, account_id, access_token, refresh_token, expires_at)
            .await
    }
}

#[async_trait]
impl AnalyticsStore for PgStore {
    async fn upsert(&self, post_id: i64, update: &AnalyticsUpdate) -> Result<(), sqlx::Error> {
        analytics::upsert_post_analytics(&self.db, post_id, update).await
    }
}
