//! Local-disk storage for uploaded media.

use std::path::{Path, PathBuf};

/// Write upload bytes under the storage root, creating parent directories as
/// needed. Returns the absolute path of the written file.
pub async fn save_upload(
    storage_root: &Path,
    file_name: &str,
    data: &[u8],
) -> Result<PathBuf, std::io::Error> {
    let path = storage_root.join(file_name);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, data).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_bytes_under_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_upload(dir.path(), "user_42/1693000000.mp4", b"video-bytes")
            .await
            .unwrap();

        assert!(path.starts_with(dir.path()));
        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(written, b"video-bytes");
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        save_upload(dir.path(), "a.mp4", b"first").await.unwrap();
        let path = save_upload(dir.path(), "a.mp4", b"second").await.unwrap();

        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(written, b"second");
    }
}
