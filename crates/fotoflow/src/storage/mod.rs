//! Object storage adapter.
//!
//! The engine only needs four operations against durable blob storage:
//! write, existence-check, signed-URL generation and delete. Deployments
//! plug in whatever backs their bucket; `FsObjectStore` is the
//! filesystem-backed implementation used in development and tests.

pub mod filesystem;
pub mod paths;

use chrono::{DateTime, Utc};

use crate::error::StorageError;

pub use filesystem::FsObjectStore;

/// Durable storage for uploaded binary deliverables.
pub trait ObjectStore: Send + Sync {
    /// Writes (or overwrites) an object at the given path.
    fn put(&self, path: &str, content: &[u8]) -> Result<(), StorageError>;

    /// Returns whether an object exists at the given path.
    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Generates a time-limited signed download URL for an object.
    fn signed_url(&self, path: &str, expires_at: DateTime<Utc>) -> Result<String, StorageError>;

    /// Deletes the object at the given path. Deleting a missing object is
    /// not an error.
    fn delete(&self, path: &str) -> Result<(), StorageError>;
}
