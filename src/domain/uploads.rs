//! Upload session domain - ephemeral records of single file transfers
//!
//! An upload session tracks one multipart transfer from the dashboard to local
//! storage. A completed session hands the post intake path a validated video
//! (or thumbnail) location.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Executor, Postgres, Type};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "uploading" => UploadStatus::Uploading,
            "completed" => UploadStatus::Completed,
            "failed" => UploadStatus::Failed,
            _ => UploadStatus::Failed,
        }
    }
}

impl Type<Postgres> for UploadStatus {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for UploadStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        Ok(UploadStatus::from_str(&s))
    }
}

impl Encode<'_, Postgres> for UploadStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UploadSession {
    pub id: i64,
    pub user_id: i64,
    pub file_name: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub status: UploadStatus,
    pub created_at: DateTime<Utc>,
}

const UPLOAD_COLUMNS: &str =
    "id, user_id, file_name, original_name, size_bytes, mime_type, storage_path, status, created_at";

/// Open an upload session in `uploading` status
pub async fn create_upload<'e, E>(
    executor: E,
    user_id: i64,
    file_name: &str,
    original_name: &str,
    mime_type: &str,
    storage_path: &str,
) -> Result<UploadSession, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        INSERT INTO upload_sessions (user_id, file_name, original_name, size_bytes,
                                     mime_type, storage_path, status)
        VALUES ($1, $2, $3, 0, $4, $5, 'uploading')
        RETURNING {UPLOAD_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(file_name)
    .bind(original_name)
    .bind(mime_type)
    .bind(storage_path)
    .fetch_one(executor)
    .await
}

/// Mark an upload session completed once the bytes are on disk
pub async fn complete_upload<'e, E>(
    executor: E,
    upload_id: i64,
    size_bytes: i64,
) -> Result<Option<UploadSession>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        UPDATE upload_sessions
        SET status = 'completed', size_bytes = $2
        WHERE id = $1
        RETURNING {UPLOAD_COLUMNS}
        "#
    ))
    .bind(upload_id)
    .bind(size_bytes)
    .fetch_optional(executor)
    .await
}

/// Mark an upload session failed (transfer aborted or disk write error)
pub async fn fail_upload<'e, E>(executor: E, upload_id: i64) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("UPDATE upload_sessions SET status = 'failed' WHERE id = $1")
        .bind(upload_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Get an upload session, scoped to its owner
pub async fn get_upload_for_owner<'e, E>(
    executor: E,
    upload_id: i64,
    user_id: i64,
) -> Result<Option<UploadSession>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {UPLOAD_COLUMNS} FROM upload_sessions WHERE id = $1 AND user_id = $2"
    ))
    .bind(upload_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}
