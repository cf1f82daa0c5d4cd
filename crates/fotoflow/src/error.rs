use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FotoflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Errors from workflow operations: the state machine, assignment,
/// revision policy, QC gate and deliverable organizer.
///
/// `NotFound`/`Forbidden`/`Conflict`/`Validation` are returned synchronously
/// to the caller and never swallowed. Side-effect failures (notification,
/// calendar) are logged and must never surface through this type.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Wrong tenant, role or assignment for the attempted operation.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Optimistic-concurrency loss or an invalid-state transition attempt.
    /// Callers should treat this as stale client state and re-fetch.
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    /// A required field is missing or malformed (e.g. empty revision notes).
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The revision round budget is exhausted. Carries the computed counts
    /// so callers can present the remaining rounds (zero) to the user.
    #[error("Revision limit reached: {used_rounds} of {max_rounds} rounds used")]
    RevisionLimit { used_rounds: u32, max_rounds: u32 },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    /// Object storage failure during a primary operation.
    #[error("Upstream storage failure: {0}")]
    Upstream(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{path}': {source}")]
    WriteObject {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete object '{path}': {source}")]
    DeleteObject {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stat object '{path}': {source}")]
    StatObject {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, FotoflowError>;
