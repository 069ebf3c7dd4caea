//! Upload endpoints (/uploads/*)
//!
//! Accepts one file per request as multipart form data. Bytes land on local
//! disk under STORAGE_PATH; the session row tracks the transfer.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use std::sync::Arc;

use crate::AppState;
use crate::domain::uploads::{self, UploadSession};
use crate::services::error::LogErr;
use super::auth::AuthUser;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/uploads", post(upload_file))
        .route("/uploads/{id}", get(get_upload))
}

/// Map a content type to a storage file extension
fn get_extension(content_type: &str) -> &'static str {
    match content_type {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// POST /uploads - Upload a video (or thumbnail image) for later posting
async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadSession>), StatusCode> {
    let field = multipart
        .next_field()
        .await
        .log_status("Multipart field error", StatusCode::BAD_REQUEST)?
        .ok_or(StatusCode::BAD_REQUEST)?;

    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    // Only video payloads and image thumbnails are accepted
    if !content_type.starts_with("video/") && !content_type.starts_with("image/") {
        return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    let original_name = field
        .file_name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "upload".to_string());

    let body = field
        .bytes()
        .await
        .log_status("Multipart body error", StatusCode::BAD_REQUEST)?;

    if body.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let timestamp = Utc::now().timestamp_millis();
    let ext = get_extension(&content_type);
    let file_name = format!("user_{}/{}.{}", user_id, timestamp, ext);
    let storage_path = state.storage_path.join(&file_name);

    let session = uploads::create_upload(
        &state.db,
        user_id,
        &file_name,
        &original_name,
        &content_type,
        &storage_path.to_string_lossy(),
    )
    .await
    .log_500("Create upload session error")?;

    if let Err(e) = crate::storage::save_upload(&state.storage_path, &file_name, &body).await {
        eprintln!("[uploads] Failed to write {}: {}", file_name, e);
        if let Err(db_err) = uploads::fail_upload(&state.db, session.id).await {
            eprintln!(
                "[uploads] Failed to mark upload {} failed: {}",
                session.id, db_err
            );
        }
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let completed = uploads::complete_upload(&state.db, session.id, body.len() as i64)
        .await
        .log_500("Complete upload session error")?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    println!(
        "[uploads] Saved {} bytes to {}",
        completed.size_bytes, file_name
    );

    Ok((StatusCode::CREATED, Json(completed)))
}

/// GET /uploads/:id - Check an upload session
async fn get_upload(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(upload_id): Path<i64>,
) -> Result<Json<UploadSession>, StatusCode> {
    let session = uploads::get_upload_for_owner(&state.db, upload_id, user_id)
        .await
        .log_500("Get upload session error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(session))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping_covers_accepted_types() {
        assert_eq!(get_extension("video/mp4"), "mp4");
        assert_eq!(get_extension("video/quicktime"), "mov");
        assert_eq!(get_extension("image/jpeg"), "jpg");
        assert_eq!(get_extension("application/pdf"), "bin");
    }
}
