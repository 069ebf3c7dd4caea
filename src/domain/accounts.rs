//! Connected account domain - stored platform credentials and profile snapshots
//!
//! All query functions use the generic Executor pattern, allowing them to work
//! with both `&PgPool` (for standalone queries) and `&mut PgConnection` (for
//! transactions).

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

/// A connected platform account: credential pair plus a profile snapshot
/// captured at connect time.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConnectedAccount {
    pub id: i64,
    pub user_id: i64,
    // Fetched from DB but intentionally not exposed in API responses
    pub remote_user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
    pub likes_count: i64,
    pub video_count: i64,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const ACCOUNT_COLUMNS: &str = "id, user_id, remote_user_id, username, display_name, avatar_url, \
     follower_count, following_count, likes_count, video_count, access_token, \
     refresh_token, token_expires_at, is_active, created_at, updated_at";

/// Profile fields captured from the platform's user-info endpoint.
#[derive(Debug, Clone)]
pub struct AccountProfile {
    pub remote_user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
    pub likes_count: i64,
    pub video_count: i64,
}

/// Get an account by ID
pub async fn get_account<'e, E>(
    executor: E,
    account_id: i64,
) -> Result<Option<ConnectedAccount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
    ))
    .bind(account_id)
    .fetch_optional(executor)
    .await
}

/// Get an account by ID, scoped to its owner
pub async fn get_account_for_owner<'e, E>(
    executor: E,
    account_id: i64,
    user_id: i64,
) -> Result<Option<ConnectedAccount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 AND user_id = $2"
    ))
    .bind(account_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// List a user's connected accounts
pub async fn list_accounts_by_owner<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Vec<ConnectedAccount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 ORDER BY id"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Insert or refresh a connected account after an OAuth exchange, keyed by
/// (user_id, remote_user_id). Re-connecting reactivates a disconnected
/// account and replaces its credential pair.
pub async fn upsert_account<'e, E>(
    executor: E,
    user_id: i64,
    profile: &AccountProfile,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO accounts (user_id, remote_user_id, username, display_name, avatar_url,
                              follower_count, following_count, likes_count, video_count,
                              access_token, refresh_token, token_expires_at, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, TRUE)
        ON CONFLICT (user_id, remote_user_id) DO UPDATE SET
            username = $3,
            display_name = $4,
            avatar_url = $5,
            follower_count = $6,
            following_count = $7,
            likes_count = $8,
            video_count = $9,
            access_token = $10,
            refresh_token = COALESCE($11, accounts.refresh_token),
            token_expires_at = $12,
            is_active = TRUE,
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&profile.remote_user_id)
    .bind(&profile.username)
    .bind(&profile.display_name)
    .bind(&profile.avatar_url)
    .bind(profile.follower_count)
    .bind(profile.following_count)
    .bind(profile.likes_count)
    .bind(profile.video_count)
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .fetch_one(executor)
    .await?;

    Ok(row.0)
}

/// Replace an account's credential pair after a token refresh
pub async fn update_account_tokens<'e, E>(
    executor: E,
    account_id: i64,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE accounts SET
            access_token = $2,
            refresh_token = COALESCE($3, refresh_token),
            token_expires_at = $4,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Disconnect an account. Posts keep referencing it, but publishing through
/// it is rejected. Returns true if a row was updated.
pub async fn deactivate_account<'e, E>(
    executor: E,
    account_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE accounts SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND user_id = $2",
    )
    .bind(account_id)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
