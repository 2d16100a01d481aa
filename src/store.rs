//! Permanent storage for completed downloads

use crate::descriptor::FileId;
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Durable home for completed downloads, keyed by identity.
///
/// Only the engine's finish handler writes through this interface; readers
/// ask `is_persisted` rather than polling the filesystem.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Move the payload from its temporary location to the permanent one.
    /// Must be idempotent: replaying a relocation that already happened
    /// (destination present, temp gone) succeeds without side effects.
    async fn relocate(&self, temp_path: &Path, identity: &FileId) -> Result<PathBuf>;

    /// Whether a completed payload exists for this identity.
    async fn is_persisted(&self, identity: &FileId) -> bool;
}

/// Store keeping payloads under a single root directory, one file per
/// identity with path separators flattened out of the name.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Permanent path for an identity.
    pub fn path_for(&self, identity: &FileId) -> PathBuf {
        self.root.join(sanitize(identity.as_str()))
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn relocate(&self, temp_path: &Path, identity: &FileId) -> Result<PathBuf> {
        let dest = self.path_for(identity);

        // Replay of an already-applied relocation.
        let temp_exists = tokio::fs::try_exists(temp_path).await.unwrap_or(false);
        if !temp_exists {
            if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
                return Ok(dest);
            }
            return Err(TransferError::persistence(format!(
                "temporary file missing: {}",
                temp_path.display()
            )));
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| TransferError::persistence(e.to_string()))?;

        if tokio::fs::rename(temp_path, &dest).await.is_err() {
            // Rename fails across filesystems; fall back to copy + remove.
            tokio::fs::copy(temp_path, &dest)
                .await
                .map_err(|e| TransferError::persistence(e.to_string()))?;
            let _ = tokio::fs::remove_file(temp_path).await;
        }

        Ok(dest)
    }

    async fn is_persisted(&self, identity: &FileId) -> bool {
        tokio::fs::try_exists(self.path_for(identity))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_relocate_moves_payload() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("files"));
        let temp = dir.path().join("payload.part");
        tokio::fs::write(&temp, b"content").await.unwrap();

        let identity: FileId = "srv/a.bin".into();
        let dest = store.relocate(&temp, &identity).await.unwrap();

        assert!(!temp.exists());
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"content");
        assert!(store.is_persisted(&identity).await);
    }

    #[tokio::test]
    async fn test_relocate_replay_is_a_no_op() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("files"));
        let temp = dir.path().join("payload.part");
        tokio::fs::write(&temp, b"content").await.unwrap();

        let identity: FileId = "a.bin".into();
        let first = store.relocate(&temp, &identity).await.unwrap();
        let second = store.relocate(&temp, &identity).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(tokio::fs::read(&second).await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_missing_temp_without_destination_is_an_error() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("files"));
        let missing = dir.path().join("never-written.part");

        let result = store.relocate(&missing, &"a.bin".into()).await;
        assert!(matches!(result, Err(TransferError::Persistence(_))));
        assert!(!store.is_persisted(&"a.bin".into()).await);
    }

    #[test]
    fn test_identity_sanitization() {
        let store = LocalFileStore::new("/data");
        let path = store.path_for(&"srv/sub\\x:y.bin".into());
        assert_eq!(path, PathBuf::from("/data/srv_sub_x_y.bin"));
    }
}
