use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};

use super::ObjectStore;
use crate::error::StorageError;

/// Filesystem-backed object store rooted at a single directory.
///
/// Object paths are slash-separated keys relative to the root. Signed URLs
/// are `file://` URLs carrying the expiry and an opaque token; the request
/// layer in front of the engine is expected to verify them.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves an object key to an absolute filesystem path, rejecting
    /// keys that could escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        if path.is_empty() || path.starts_with('/') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        if path.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&full, content).map_err(|e| StorageError::WriteObject {
            path: full.clone(),
            source: e,
        })?;
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        match std::fs::symlink_metadata(&full) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::StatObject {
                path: full,
                source: e,
            }),
        }
    }

    fn signed_url(&self, path: &str, expires_at: DateTime<Utc>) -> Result<String, StorageError> {
        let full = self.resolve(path)?;
        let expires = expires_at.timestamp();
        let token = URL_SAFE_NO_PAD.encode(format!("{}:{}", path, expires));
        Ok(format!(
            "file://{}?expires={}&sig={}",
            full.display(),
            expires,
            token
        ))
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match std::fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteObject {
                path: full,
                source: e,
            }),
        }
    }
}
