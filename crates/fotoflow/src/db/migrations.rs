//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order. Some migrations (ALTER TABLE ADD COLUMN)
//! are handled conditionally to support idempotent execution.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    /// Whether this migration needs conditional handling
    /// (e.g. ADD COLUMN that may already exist).
    kind: MigrationKind,
}

enum MigrationKind {
    /// Execute the SQL directly.
    Standard,
    /// ALTER TABLE ADD COLUMN — skip if column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_core_tables",
        sql: include_str!("sql/001_create_core_tables.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create_delivery_tables",
        sql: include_str!("sql/002_create_delivery_tables.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "create_reviews_and_activity",
        sql: include_str!("sql/003_create_reviews_and_activity.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 4,
        description: "add_cover_image_to_jobs",
        sql: include_str!("sql/004_add_cover_image.sql"),
        kind: MigrationKind::AddColumn {
            table: "jobs",
            column: "cover_image",
        },
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    // Create the migrations tracking table.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        let should_run = match &migration.kind {
            MigrationKind::Standard => true,
            MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
        };

        if should_run {
            conn.execute_batch(migration.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: migration.version,
                    reason: e.to_string(),
                })?;
        } else {
            log::info!(
                "Skipping migration v{} (condition not met)",
                migration.version
            );
        }

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

/// Checks whether a column exists on a table using `PRAGMA table_info`.
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    // Validate identifier — only alphanumeric and underscores allowed.
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid table name: {}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|r| r.map(|name| name == column).unwrap_or(false));
    Ok(exists)
}
