//! User domain - DB queries for dashboard users
//!
//! Session mechanics live outside this service; requests arrive with an
//! already-authenticated user id.

use sqlx::{Executor, Postgres};

#[derive(Debug, sqlx::FromRow)]
pub struct UserBasicInfo {
    pub username: String,
}

/// Get basic user info by ID
pub async fn get_user_by_id<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<UserBasicInfo>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT username FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}
