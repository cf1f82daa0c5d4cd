//! Job repository — CRUD operations for the `jobs` table.
//!
//! Jobs are never hard-deleted; lifecycle changes go through status updates.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub tenant_id: String,
    pub address: String,
    pub status: String,
    pub customer_id: Option<String>,
    /// Legacy single-assignment field kept for display purposes; the
    /// per-order `assigned_editor` is authoritative.
    pub editor_of_record: Option<String>,
    pub delivered_at: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            address: row.get("address")?,
            status: row.get("status")?,
            customer_id: row.get("customer_id")?,
            editor_of_record: row.get("editor_of_record")?,
            delivered_at: row.get("delivered_at")?,
            cover_image: row.get("cover_image")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, tenant_id, address, status, customer_id, editor_of_record,
             delivered_at, cover_image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                job.id,
                job.tenant_id,
                job.address,
                job.status,
                job.customer_id,
                job.editor_of_record,
                job.delivered_at,
                job.cover_image,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists jobs for a tenant, most recent first.
pub fn list_by_tenant(db: &Database, tenant_id: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM jobs WHERE tenant_id = ?1 ORDER BY created_at DESC")?;
        let rows: Vec<JobRow> = stmt
            .query_map(params![tenant_id], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Updates only the status and updated_at of a job.
pub fn update_status(
    db: &Database,
    id: &str,
    status: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status, updated_at],
        )?;
        Ok(())
    })
}

/// Marks a job delivered. Conditional on the job not already being in a
/// terminal state; returns whether the row was updated.
pub fn mark_delivered(
    db: &Database,
    id: &str,
    delivered_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs SET status = 'delivered', delivered_at = ?2, updated_at = ?2
             WHERE id = ?1 AND status NOT IN ('delivered', 'cancelled')",
            params![id, delivered_at],
        )?;
        Ok(affected == 1)
    })
}

/// Sets the job's cover image reference.
pub fn set_cover_image(
    db: &Database,
    id: &str,
    deliverable_id: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET cover_image = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, deliverable_id, updated_at],
        )?;
        Ok(())
    })
}

/// Records the editor of record (legacy display field).
pub fn set_editor_of_record(
    db: &Database,
    id: &str,
    editor_id: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET editor_of_record = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, editor_id, updated_at],
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tenant_repo::{self, TenantRow};

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        tenant_repo::insert_tenant(
            &db,
            &TenantRow {
                id: "t1".to_string(),
                name: "Studio".to_string(),
                revision_limit_enabled: false,
                revision_round_limit: 2,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        db
    }

    fn sample_job(id: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            address: "12 Harbor Lane".to_string(),
            status: "booked".to_string(),
            customer_id: Some("c1".to_string()),
            editor_of_record: None,
            delivered_at: None,
            cover_image: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_job("j1")).unwrap();

        let found = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(found.address, "12 Harbor Lane");
        assert_eq!(found.status, "booked");
        assert!(found.delivered_at.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_list_by_tenant() {
        let db = test_db();
        insert(&db, &sample_job("j1")).unwrap();
        insert(&db, &sample_job("j2")).unwrap();

        let rows = list_by_tenant(&db, "t1").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(list_by_tenant(&db, "t2").unwrap().is_empty());
    }

    #[test]
    fn test_mark_delivered_once() {
        let db = test_db();
        insert(&db, &sample_job("j1")).unwrap();

        assert!(mark_delivered(&db, "j1", "2026-01-02T00:00:00Z").unwrap());
        let found = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(found.status, "delivered");
        assert_eq!(found.delivered_at.as_deref(), Some("2026-01-02T00:00:00Z"));

        // Second delivery attempt does not match the guard.
        assert!(!mark_delivered(&db, "j1", "2026-01-03T00:00:00Z").unwrap());
        let found = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(found.delivered_at.as_deref(), Some("2026-01-02T00:00:00Z"));
    }

    #[test]
    fn test_set_cover_image() {
        let db = test_db();
        insert(&db, &sample_job("j1")).unwrap();

        set_cover_image(&db, "j1", "d42", "2026-01-02T00:00:00Z").unwrap();
        let found = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(found.cover_image.as_deref(), Some("d42"));
    }
}
