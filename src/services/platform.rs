//! Platform client capability seam.
//!
//! The publish orchestrator and analytics reconciler talk to the remote
//! platform through the `PlatformClient` trait. Two implementations exist and
//! are interchangeable: `TikTokClient` (the real API, see `services::tiktok`)
//! and `StubPlatformClient` (a deterministic stand-in selected with
//! `PLATFORM_MODE=stub` and used throughout the tests).
//!
//! The client never retries; retry policy belongs to the callers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::analytics::AnalyticsUpdate;
use crate::domain::posts::PrivacyLevel;

#[derive(Debug)]
pub enum PlatformError {
    /// The credential was rejected by the platform.
    Auth(String),
    /// The platform rejected the post options or video location.
    Validation(String),
    /// Transport failure or platform outage (includes timeouts).
    Unavailable(String),
    Http(reqwest::Error),
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        PlatformError::Http(e)
    }
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::Auth(s) => write!(f, "platform rejected credential: {}", s),
            PlatformError::Validation(s) => write!(f, "platform rejected request: {}", s),
            PlatformError::Unavailable(s) => write!(f, "platform unavailable: {}", s),
            PlatformError::Http(e) => write!(f, "HTTP error: {}", e),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Audience values in the platform's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemotePrivacy {
    PublicToEveryone,
    MutualFollowFriend,
    SelfOnly,
}

impl RemotePrivacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemotePrivacy::PublicToEveryone => "PUBLIC_TO_EVERYONE",
            RemotePrivacy::MutualFollowFriend => "MUTUAL_FOLLOW_FRIEND",
            RemotePrivacy::SelfOnly => "SELF_ONLY",
        }
    }
}

// Fixed, total mapping from dashboard privacy to the remote enum
impl From<PrivacyLevel> for RemotePrivacy {
    fn from(privacy: PrivacyLevel) -> Self {
        match privacy {
            PrivacyLevel::Public => RemotePrivacy::PublicToEveryone,
            PrivacyLevel::Friends => RemotePrivacy::MutualFollowFriend,
            PrivacyLevel::Private => RemotePrivacy::SelfOnly,
        }
    }
}

/// Options sent with a publish call, in the platform's terms (interaction
/// toggles are inverted: the dashboard stores "allow", the platform wants
/// "disable").
#[derive(Debug, Clone)]
pub struct PostOptions {
    pub title: String,
    pub privacy: RemotePrivacy,
    pub disable_duet: bool,
    pub disable_comment: bool,
    pub disable_stitch: bool,
}

/// Profile snapshot returned by the platform's user-info endpoint.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub remote_user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
    pub likes_count: i64,
    pub video_count: i64,
}

/// Credential pair returned by a code exchange or token refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub open_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Per-video engagement numbers as reported by the platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoMetrics {
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub share_count: i64,
    #[serde(default)]
    pub average_watch_time_ms: i64,
    #[serde(default)]
    pub total_play_time_ms: i64,
    #[serde(default)]
    pub profile_views: i64,
}

impl From<&VideoMetrics> for AnalyticsUpdate {
    fn from(m: &VideoMetrics) -> Self {
        AnalyticsUpdate {
            view_count: m.view_count,
            like_count: m.like_count,
            comment_count: m.comment_count,
            share_count: m.share_count,
            average_watch_time_ms: m.average_watch_time_ms,
            total_play_time_ms: m.total_play_time_ms,
            profile_views: m.profile_views,
        }
    }
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Fetch the profile behind a credential.
    async fn fetch_account_info(&self, access_token: &str) -> Result<AccountInfo, PlatformError>;

    /// Publish a video the platform pulls from `video_url`. Returns the
    /// remote publish id.
    async fn publish_from_url(
        &self,
        access_token: &str,
        video_url: &str,
        options: &PostOptions,
    ) -> Result<String, PlatformError>;

    /// Fetch engagement metrics for a set of remote video ids. Ids the
    /// platform does not recognize are absent from the result, not errors.
    async fn fetch_metrics(
        &self,
        access_token: &str,
        video_ids: &[String],
    ) -> Result<HashMap<String, VideoMetrics>, PlatformError>;

    /// Exchange a refresh token for a fresh credential pair.
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, PlatformError>;
}

/// Failure modes the stub can be configured to produce.
#[derive(Debug, Clone, Copy)]
pub enum StubFailure {
    Auth,
    Validation,
    Unavailable,
}

impl StubFailure {
    fn to_error(self, message: &str) -> PlatformError {
        match self {
            StubFailure::Auth => PlatformError::Auth(message.to_string()),
            StubFailure::Validation => PlatformError::Validation(message.to_string()),
            StubFailure::Unavailable => PlatformError::Unavailable(message.to_string()),
        }
    }
}

/// Deterministic stand-in for the real platform.
///
/// Publish ids are sequential (`stub-publish-1`, `stub-publish-2`, ...);
/// metrics come from a fixed map. By default every call succeeds.
#[derive(Default)]
pub struct StubPlatformClient {
    publish_counter: AtomicU64,
    publish_failure: Option<StubFailure>,
    metrics: HashMap<String, VideoMetrics>,
    metrics_failures: HashSet<String>,
}

impl StubPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish call fail with the given error kind.
    pub fn with_publish_failure(mut self, failure: StubFailure) -> Self {
        self.publish_failure = Some(failure);
        self
    }

    /// Serve fixed metrics for a remote video id.
    pub fn with_metrics(mut self, video_id: &str, metrics: VideoMetrics) -> Self {
        self.metrics.insert(video_id.to_string(), metrics);
        self
    }

    /// Fail any metrics query that includes the given remote video id.
    pub fn with_metrics_failure(mut self, video_id: &str) -> Self {
        self.metrics_failures.insert(video_id.to_string());
        self
    }
}

#[async_trait]
impl PlatformClient for StubPlatformClient {
    async fn fetch_account_info(&self, _access_token: &str) -> Result<AccountInfo, PlatformError> {
        Ok(AccountInfo {
            remote_user_id: "stub-open-id".to_string(),
            username: "stubuser".to_string(),
            display_name: Some("Stub User".to_string()),
            avatar_url: None,
            follower_count: 0,
            following_count: 0,
            likes_count: 0,
            video_count: 0,
        })
    }

    async fn publish_from_url(
        &self,
        _access_token: &str,
        _video_url: &str,
        _options: &PostOptions,
    ) -> Result<String, PlatformError> {
        if let Some(failure) = self.publish_failure {
            return Err(failure.to_error("stub publish failure"));
        }
        let n = self.publish_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("stub-publish-{}", n))
    }

    async fn fetch_metrics(
        &self,
        _access_token: &str,
        video_ids: &[String],
    ) -> Result<HashMap<String, VideoMetrics>, PlatformError> {
        if video_ids.iter().any(|id| self.metrics_failures.contains(id)) {
            return Err(PlatformError::Unavailable("stub metrics failure".to_string()));
        }
        Ok(video_ids
            .iter()
            .filter_map(|id| self.metrics.get(id).map(|m| (id.clone(), m.clone())))
            .collect())
    }

    async fn refresh_access_token(
        &self,
        _refresh_token: &str,
    ) -> Result<TokenResponse, PlatformError> {
        Ok(TokenResponse {
            access_token: "stub-access-refreshed".to_string(),
            refresh_token: Some("stub-refresh".to_string()),
            expires_in: 86400,
            open_id: Some("stub-open-id".to_string()),
            scope: None,
        })
    }
}
