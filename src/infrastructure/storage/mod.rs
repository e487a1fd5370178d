//! File Storage
//!
//! Files are stored under a random name that keeps the original extension.
//! The stored name is what `attachments.file_path` and
//! `users.profile_picture` hold, and what the download routes accept.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::shared::error::AppError;

/// A file written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Name under which the file can be read back
    pub file_path: String,
    /// Size in bytes
    pub file_size: i64,
}

/// Blob storage for attachments and profile pictures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `bytes` and return the generated name.
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile, AppError>;

    /// Read a stored file, `None` if it does not exist.
    async fn read(&self, file_path: &str) -> Result<Option<Vec<u8>>, AppError>;

    async fn delete(&self, file_path: &str) -> Result<(), AppError>;
}

/// Storage on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create the root directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve a stored name to a path inside the root.
    ///
    /// Names that could escape the root are rejected.
    fn resolve(&self, file_path: &str) -> Result<PathBuf, AppError> {
        let valid = !file_path.is_empty()
            && file_path
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !file_path.starts_with('.');

        if !valid {
            return Err(AppError::BadRequest("Invalid file name".into()));
        }

        Ok(self.root.join(file_path))
    }
}

/// Generated storage name for an upload, keeping a sane extension.
fn stored_name(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());

    match extension {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

#[async_trait]
impl Storage for LocalStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile, AppError> {
        let file_path = stored_name(original_name);
        let path = self.resolve(&file_path)?;

        tokio::fs::write(&path, bytes).await?;
        debug!(file_path = %file_path, "Stored file");

        Ok(StoredFile {
            file_path,
            file_size: bytes.len() as i64,
        })
    }

    async fn read(&self, file_path: &str) -> Result<Option<Vec<u8>>, AppError> {
        let path = self.resolve(file_path)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, file_path: &str) -> Result<(), AppError> {
        let path = self.resolve(file_path)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_storage() -> LocalStorage {
        let root = std::env::temp_dir().join(format!("messenger-storage-{}", Uuid::new_v4()));
        LocalStorage::new(root).await.unwrap()
    }

    #[test]
    fn test_stored_name_keeps_extension() {
        let name = stored_name("Holiday Photo.JPG");
        assert!(name.ends_with(".jpg"));
        assert_ne!(name, stored_name("Holiday Photo.JPG"));
    }

    #[test]
    fn test_stored_name_without_extension() {
        let name = stored_name("README");
        assert!(!name.contains('.'));
    }

    #[tokio::test]
    async fn test_save_read_delete() {
        let storage = temp_storage().await;

        let stored = storage.save("note.txt", b"hello").await.unwrap();
        assert_eq!(stored.file_size, 5);

        let bytes = storage.read(&stored.file_path).await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"hello"[..]));

        storage.delete(&stored.file_path).await.unwrap();
        assert!(storage.read(&stored.file_path).await.unwrap().is_none());

        // Deleting twice is fine
        storage.delete(&stored.file_path).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let storage = temp_storage().await;

        for name in ["../etc/passwd", "a/b", ".env", ""] {
            assert!(matches!(
                storage.read(name).await,
                Err(AppError::BadRequest(_))
            ));
        }
    }
}
