//! Entity store adapter for the fulfillment workflow.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle. All access
//! is serialized through a `Mutex<Connection>`. Conditional single-statement
//! updates (`UPDATE ... WHERE <precondition>` checked via `rows_affected`)
//! are the sole serialization mechanism for workflow state; no lock is ever
//! held across an external call.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod activity_repo;
pub mod appointment_repo;
pub mod comment_repo;
pub mod deliverable_repo;
pub mod error;
pub mod folder_repo;
pub mod job_repo;
pub mod migrations;
pub mod order_repo;
pub mod order_service_repo;
pub mod review_repo;
pub mod tenant_repo;

pub use error::DatabaseError;

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). All access is serialized through
/// a `Mutex`, which is fine for SQLite (which serializes writes anyway).
/// WAL mode is enabled for concurrent read performance.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Returns the canonical database path: `~/.fotoflow/data/fotoflow.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".fotoflow").join("data").join("fotoflow.db"))
}

/// Escapes `%`, `_` and `\` so a stored path can be bound as a literal
/// prefix in a `LIKE ... ESCAPE '\'` pattern. Folder names may legally
/// contain LIKE metacharacters; without this, `a_b/%` also matches `axb/`.
pub(crate) fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
