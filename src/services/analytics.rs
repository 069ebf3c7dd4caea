//! Analytics reconciliation: pulls engagement metrics from the platform for
//! every published post and upserts them locally.
//!
//! The sweep is fault-isolated per post: a remote failure for one post is
//! counted and logged but never stops the sweep. Store failures do abort,
//! since nothing useful can be recorded without the store.

use std::sync::Arc;

use crate::domain::analytics::AnalyticsUpdate;
use crate::domain::store::{AccountStore, AnalyticsStore, PostStore};
use super::auth;
use super::platform::PlatformClient;
use super::publisher::PublishError;

/// Outcome tally for one reconciliation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Posts whose metrics were fetched and stored.
    pub synced: u64,
    /// Posts passed over (no remote id, account gone or inactive, or the
    /// platform no longer reports the video).
    pub skipped: u64,
    /// Posts where the platform call failed.
    pub failed: u64,
}

impl SyncReport {
    pub fn message(&self) -> String {
        format!(
            "analytics sync complete: {} synced, {} skipped, {} failed",
            self.synced, self.skipped, self.failed
        )
    }
}

#[derive(Clone)]
pub struct AnalyticsSync {
    posts: Arc<dyn PostStore>,
    accounts: Arc<dyn AccountStore>,
    analytics: Arc<dyn AnalyticsStore>,
    platform: Arc<dyn PlatformClient>,
}

impl AnalyticsSync {
    pub fn new(
        posts: Arc<dyn PostStore>,
        accounts: Arc<dyn AccountStore>,
        analytics: Arc<dyn AnalyticsStore>,
        platform: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            posts,
            accounts,
            analytics,
            platform,
        }
    }

    /// Reconcile metrics for all of the user's published posts.
    pub async fn sync_analytics(&self, user_id: i64) -> Result<SyncReport, sqlx::Error> {
        let posts = self.posts.list_posted_by_owner(user_id).await?;
        let mut report = SyncReport::default();

        for post in posts {
            let Some(remote_id) = post.remote_post_id.clone() else {
                report.skipped += 1;
                continue;
            };

            let Some(account) = self
                .accounts
                .get(post.account_id)
                .await?
                .filter(|a| a.is_active)
            else {
                report.skipped += 1;
                continue;
            };

            let access_token =
                match auth::ensure_valid_access_token(&self.accounts, &self.platform, &account)
                    .await
                {
                    Ok(token) => token,
                    Err(PublishError::Store(e)) => return Err(e),
                    Err(e) => {
                        eprintln!("[analytics] Post {}: {}", post.id, e);
                        report.failed += 1;
                        continue;
                    }
                };

            let metrics = match self
                .platform
                .fetch_metrics(&access_token, std::slice::from_ref(&remote_id))
                .await
            {
                Ok(metrics) => metrics,
                Err(e) => {
                    eprintln!("[analytics] Post {}: {}", post.id, e);
                    report.failed += 1;
                    continue;
                }
            };

            match metrics.get(&remote_id) {
                Some(m) => {
                    self.analytics
                        .upsert(post.id, &AnalyticsUpdate::from(m))
                        .await?;
                    report.synced += 1;
                }
                // The platform no longer reports the video (deleted or
                // private); keep the last stored snapshot
                None => report.skipped += 1,
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::accounts::ConnectedAccount;
    use crate::domain::posts::{Post, PostStatus, PrivacyLevel};
    use crate::domain::store::memory::MemoryStore;
    use crate::services::platform::{StubPlatformClient, VideoMetrics};

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

    fn posted(id: i64, user_id: i64, account_id: i64, remote_id: &str) -> Post {
        let now = Utc::now();
        Post {
            id,
            user_id,
            account_id,
            title: "My video".to_string(),
            description: None,
            hashtags: vec![],
            video_url: "https://cdn.example.com/v.mp4".to_string(),
            thumbnail_url: None,
            status: PostStatus::Posted,
            privacy: PrivacyLevel::Public,
            allow_comments: true,
            allow_duet: true,
            allow_stitch: true,
            scheduled_at: None,
            posted_at: Some(now),
            remote_post_id: Some(remote_id.to_string()),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sync_with(store: &Arc<MemoryStore>, platform: StubPlatformClient) -> AnalyticsSync {
        AnalyticsSync::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(platform),
        )
    }

    fn metrics(views: i64, likes: i64) -> VideoMetrics {
        VideoMetrics {
            view_count: views,
            like_count: likes,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn one_failing_post_does_not_stop_the_sweep() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(posted(10, 42, 1, "vid-a"));
        store.seed_post(posted(11, 42, 1, "vid-b"));
        store.seed_post(posted(12, 42, 1, "vid-c"));
        let sync = sync_with(
            &store,
            StubPlatformClient::new()
                .with_metrics("vid-a", metrics(100, 5))
                .with_metrics_failure("vid-b")
                .with_metrics("vid-c", metrics(7, 0)),
        );

        let report = sync.sync_analytics(42).await.unwrap();

        assert_eq!(report.synced, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(store.analytics(10).unwrap().view_count, 100);
        assert_eq!(store.analytics(12).unwrap().view_count, 7);
        assert!(store.analytics(11).is_none());
    }

    #[tokio::test]
    async fn unknown_remote_id_is_skipped_without_a_row() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(posted(10, 42, 1, "vid-gone"));
        let sync = sync_with(&store, StubPlatformClient::new());

        let report = sync.sync_analytics(42).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.synced, 0);
        assert!(store.analytics(10).is_none());
    }

    #[tokio::test]
    async fn inactive_account_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut account = test_account(1, 42);
        account.is_active = false;
        store.seed_account(account);
        store.seed_post(posted(10, 42, 1, "vid-a"));
        let sync = sync_with(
            &store,
            StubPlatformClient::new().with_metrics("vid-a", metrics(1, 1)),
        );

        let report = sync.sync_analytics(42).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(store.analytics(10).is_none());
    }

    #[tokio::test]
    async fn missing_account_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        store.seed_post(posted(10, 42, 99, "vid-a"));
        let sync = sync_with(&store, StubPlatformClient::new());

        let report = sync.sync_analytics(42).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn resync_overwrites_previous_metrics() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account(test_account(1, 42));
        store.seed_post(posted(10, 42, 1, "vid-a"));

        sync_with(
            &store,
            StubPlatformClient::new().with_metrics("vid-a", metrics(10, 1)),
        )
        .sync_analytics(42)
        .await
        .unwrap();
        assert_eq!(store.analytics(10).unwrap().view_count, 10);

        sync_with(
            &store,
            StubPlatformClient::new().with_metrics("vid-a", metrics(250, 30)),
        )
        .sync_analytics(42)
        .await
        .unwrap();

        let row = store.analytics(10).unwrap();
        assert_eq!(row.view_count, 250);
        assert_eq!(row.like_count, 30);
    }

    #[test]
    fn report_message_includes_all_tallies() {
        let report = SyncReport {
            synced: 3,
            skipped: 1,
            failed: 2,
        };
        assert_eq!(
            report.message(),
            "analytics sync complete: 3 synced, 1 skipped, 2 failed"
        );
    }
}
