//! TikTok open API client (OAuth, content posting, video metrics).
//!
//! Wire shapes follow the published TikTok contract: every response wraps its
//! payload in `data` next to an `error` envelope whose code is `"ok"` on
//! success. Field names here are the platform's, not ours.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::platform::{
    AccountInfo, PlatformClient, PlatformError, PostOptions, TokenResponse, VideoMetrics,
};

const AUTHORIZE_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";
const TOKEN_URL: &str = "https://open.tiktokapis.com/v2/oauth/token/";
const USER_INFO_URL: &str = "https://open.tiktokapis.com/v2/user/info/";
const VIDEO_INIT_URL: &str = "https://open.tiktokapis.com/v2/post/publish/video/init/";
const VIDEO_QUERY_URL: &str = "https://open.tiktokapis.com/v2/video/query/";

#[derive(Clone)]
pub struct TikTokClient {
    client_key: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

impl TikTokClient {
    pub fn new(client_key: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_key: client_key.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            http: Client::new(),
        }
    }

    /// Generate PKCE code verifier and challenge
    fn generate_pkce() -> (String, String) {
        let verifier_bytes: [u8; 32] = rand::rng().random();
        let code_verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut hasher = Sha256::new();
        hasher.update(code_verifier.as_bytes());
        let hash = hasher.finalize();
        let code_challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash);

        (code_verifier, code_challenge)
    }

    /// Generate random state for CSRF protection
    fn generate_state() -> String {
        let bytes: [u8; 16] = rand::rng().random();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Step 1: Build authorization URL and return state + verifier to store
    pub fn get_authorize_url(&self, scopes: &[&str]) -> AuthorizeRequest {
        let state = Self::generate_state();
        let (code_verifier, code_challenge) = Self::generate_pkce();

        let scope = scopes.join(",");

        let url = format!(
            "{}?client_key={}&response_type=code&scope={}&redirect_uri={}&state={}&code_challenge={}&code_challenge_method=S256",
            AUTHORIZE_URL,
            percent_encode(&self.client_key),
            percent_encode(&scope),
            percent_encode(&self.redirect_uri),
            percent_encode(&state),
            percent_encode(&code_challenge)
        );

        AuthorizeRequest {
            url,
            state,
            code_verifier,
        }
    }

    /// Step 2: Exchange authorization code for access token
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, PlatformError> {
        let params = [
            ("client_key", self.client_key.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &self.redirect_uri),
            ("code_verifier", code_verifier),
        ];

        let resp = self
            .http
            .post(TOKEN_URL)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(PlatformError::Auth(text));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }
}

/// Map an unsuccessful HTTP response to the error taxonomy
fn status_error(status: reqwest::StatusCode, body: String) -> PlatformError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        PlatformError::Auth(body)
    } else if status.is_client_error() {
        PlatformError::Validation(body)
    } else {
        PlatformError::Unavailable(format!("status {}: {}", status, body))
    }
}

/// Every payload arrives next to this envelope; a non-"ok" code on a 200
/// response is still a failure
fn check_envelope(error: &ApiError) -> Result<(), PlatformError> {
    match error.code.as_str() {
        "ok" => Ok(()),
        "access_token_invalid" | "scope_not_authorized" | "scope_permission_missed" => {
            Err(PlatformError::Auth(error.message.clone()))
        }
        "invalid_params" | "url_ownership_unverified" | "file_format_check_failed" => {
            Err(PlatformError::Validation(error.message.clone()))
        }
        _ => Err(PlatformError::Unavailable(format!(
            "{}: {}",
            error.code, error.message
        ))),
    }
}

#[async_trait]
impl PlatformClient for TikTokClient {
    async fn fetch_account_info(&self, access_token: &str) -> Result<AccountInfo, PlatformError> {
        let url = format!(
            "{}?fields=open_id,username,display_name,avatar_url,follower_count,following_count,likes_count,video_count",
            USER_INFO_URL
        );

        let resp = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, resp.text().await?));
        }

        let wrapper: UserInfoResponse = resp.json().await?;
        check_envelope(&wrapper.error)?;

        let user = wrapper.data.user;
        Ok(AccountInfo {
            remote_user_id: user.open_id,
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            follower_count: user.follower_count,
            following_count: user.following_count,
            likes_count: user.likes_count,
            video_count: user.video_count,
        })
    }

    async fn publish_from_url(
        &self,
        access_token: &str,
        video_url: &str,
        options: &PostOptions,
    ) -> Result<String, PlatformError> {
        let body = serde_json::json!({
            "post_info": {
                "title": options.title,
                "privacy_level": options.privacy.as_str(),
                "disable_duet": options.disable_duet,
                "disable_comment": options.disable_comment,
                "disable_stitch": options.disable_stitch,
            },
            "source_info": {
                "source": "PULL_FROM_URL",
                "video_url": video_url,
            }
        });

        let resp = self
            .http
            .post(VIDEO_INIT_URL)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, resp.text().await?));
        }

        let wrapper: PublishInitResponse = resp.json().await?;
        check_envelope(&wrapper.error)?;

        Ok(wrapper.data.publish_id)
    }

    async fn fetch_metrics(
        &self,
        access_token: &str,
        video_ids: &[String],
    ) -> Result<HashMap<String, VideoMetrics>, PlatformError> {
        let url = format!(
            "{}?fields=id,view_count,like_count,comment_count,share_count",
            VIDEO_QUERY_URL
        );

        let body = serde_json::json!({
            "filters": {
                "video_ids": video_ids,
            }
        });

        let resp = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, resp.text().await?));
        }

        let wrapper: VideoQueryResponse = resp.json().await?;
        check_envelope(&wrapper.error)?;

        Ok(wrapper
            .data
            .videos
            .into_iter()
            .map(|v| (v.id, v.metrics))
            .collect())
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, PlatformError> {
        let params = [
            ("client_key", self.client_key.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let resp = self
            .http
            .post(TOKEN_URL)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(PlatformError::Auth(text));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    data: UserInfoData,
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct UserInfoData {
    user: RemoteUser,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    open_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    follower_count: i64,
    #[serde(default)]
    following_count: i64,
    #[serde(default)]
    likes_count: i64,
    #[serde(default)]
    video_count: i64,
}

#[derive(Debug, Deserialize)]
struct PublishInitResponse {
    data: PublishInitData,
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct PublishInitData {
    publish_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoQueryResponse {
    data: VideoQueryData,
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct VideoQueryData {
    #[serde(default)]
    videos: Vec<RemoteVideo>,
}

#[derive(Debug, Deserialize)]
struct RemoteVideo {
    id: String,
    #[serde(flatten)]
    metrics: VideoMetrics,
}

#[derive(Debug)]
pub struct AuthorizeRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

// Database operations

pub async fn save_oauth_state(
    db: &PgPool,
    state: &str,
    code_verifier: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO oauth_states (state, code_verifier)
        VALUES ($1, $2)
        "#,
    )
    .bind(state)
    .bind(code_verifier)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn get_oauth_state(db: &PgPool, state: &str) -> Result<Option<String>, sqlx::Error> {
    // Atomic DELETE + RETURNING prevents race conditions where two requests
    // could get the same state before either deletes it
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        DELETE FROM oauth_states
        WHERE state = $1 AND created_at > NOW() - INTERVAL '10 minutes'
        RETURNING code_verifier
        "#,
    )
    .bind(state)
    .fetch_optional(db)
    .await?;

    Ok(row.map(|r| r.0))
}
