//! Canonical object-storage path layout for deliverables.
//!
//! Everything a job delivers lives under
//! `completed/{job_id}/folders/{folder_token}/{relative_path}`. The opaque
//! folder token is the storage path segment, so renaming a folder's display
//! name never requires moving bytes. This shape is load-bearing and must not
//! change.

/// Name of the zero-byte marker written when a folder is created, so the
/// storage prefix exists before any file lands there.
pub const PLACEHOLDER_NAME: &str = ".keep";

/// Storage prefix for a folder: `completed/{job_id}/folders/{token}`.
pub fn folder_prefix(job_id: &str, folder_token: &str) -> String {
    format!("completed/{}/folders/{}", job_id, folder_token)
}

/// Storage path for a file inside a folder.
pub fn deliverable_path(job_id: &str, folder_token: &str, relative_path: &str) -> String {
    format!("{}/{}", folder_prefix(job_id, folder_token), relative_path)
}

/// Storage path of the folder's placeholder object.
pub fn placeholder_path(job_id: &str, folder_token: &str) -> String {
    deliverable_path(job_id, folder_token, PLACEHOLDER_NAME)
}
