//! Order repository — the unit of editing work.
//!
//! Orders are never deleted (audit requirement). Every workflow transition
//! is a single conditional UPDATE whose WHERE clause encodes the transition
//! guard; callers check the returned boolean to distinguish success from a
//! concurrent or stale-state loss. The `version` column is the optimistic
//! concurrency counter used by the assignment compare-and-swap; every
//! mutating statement bumps it.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw order row from the database.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub tenant_id: String,
    pub order_number: String,
    pub job_id: String,
    pub customer_id: Option<String>,
    pub assigned_editor: Option<String>,
    pub status: String,
    pub used_revision_rounds: u32,
    pub revision_notes: Option<String>,
    pub accepted_at: Option<String>,
    pub completed_at: Option<String>,
    pub approved_at: Option<String>,
    pub approved_by: Option<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl OrderRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            order_number: row.get("order_number")?,
            job_id: row.get("job_id")?,
            customer_id: row.get("customer_id")?,
            assigned_editor: row.get("assigned_editor")?,
            status: row.get("status")?,
            used_revision_rounds: row.get("used_revision_rounds")?,
            revision_notes: row.get("revision_notes")?,
            accepted_at: row.get("accepted_at")?,
            completed_at: row.get("completed_at")?,
            approved_at: row.get("approved_at")?,
            approved_by: row.get("approved_by")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn insert(db: &Database, order: &OrderRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO orders (id, tenant_id, order_number, job_id, customer_id,
             assigned_editor, status, used_revision_rounds, revision_notes, accepted_at,
             completed_at, approved_at, approved_by, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                order.id,
                order.tenant_id,
                order.order_number,
                order.job_id,
                order.customer_id,
                order.assigned_editor,
                order.status,
                order.used_revision_rounds,
                order.revision_notes,
                order.accepted_at,
                order.completed_at,
                order.approved_at,
                order.approved_by,
                order.version,
                order.created_at,
                order.updated_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<OrderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM orders WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], OrderRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Looks an order up by its human-readable number within a tenant. The
/// order number is a lookup index, not a second source of truth.
pub fn find_by_number(
    db: &Database,
    tenant_id: &str,
    order_number: &str,
) -> Result<Option<OrderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM orders WHERE tenant_id = ?1 AND order_number = ?2")?;
        let mut rows = stmt.query_map(params![tenant_id, order_number], OrderRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn list_by_job(db: &Database, job_id: &str) -> Result<Vec<OrderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM orders WHERE job_id = ?1 ORDER BY created_at ASC")?;
        let rows: Vec<OrderRow> = stmt
            .query_map(params![job_id], OrderRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists unassigned pending orders for a tenant (the assignable pool).
pub fn list_assignable(db: &Database, tenant_id: &str) -> Result<Vec<OrderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM orders WHERE tenant_id = ?1 AND status = 'pending'
             AND assigned_editor IS NULL ORDER BY created_at ASC",
        )?;
        let rows: Vec<OrderRow> = stmt
            .query_map(params![tenant_id], OrderRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Compare-and-swap editor assignment. Succeeds only if the stored version
/// still matches the one the caller read, so a concurrent assignment makes
/// this return `false` instead of silently overwriting.
pub fn assign_editor(
    db: &Database,
    id: &str,
    editor_id: &str,
    expected_version: i64,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE orders SET assigned_editor = ?2, version = version + 1, updated_at = ?3
             WHERE id = ?1 AND version = ?4",
            params![id, editor_id, updated_at, expected_version],
        )?;
        Ok(affected == 1)
    })
}

/// Editor accepts the assignment: `pending -> processing`. Guarded on the
/// order still being pending and assigned to this editor.
pub fn begin_processing(
    db: &Database,
    id: &str,
    editor_id: &str,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE orders SET status = 'processing', accepted_at = ?3, version = version + 1,
             updated_at = ?3
             WHERE id = ?1 AND status = 'pending' AND assigned_editor = ?2",
            params![id, editor_id, now],
        )?;
        Ok(affected == 1)
    })
}

/// Editor declines: `pending -> cancelled`, clearing the assignment.
pub fn decline(db: &Database, id: &str, editor_id: &str, now: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE orders SET status = 'cancelled', assigned_editor = NULL,
             version = version + 1, updated_at = ?3
             WHERE id = ?1 AND status = 'pending' AND assigned_editor = ?2",
            params![id, editor_id, now],
        )?;
        Ok(affected == 1)
    })
}

/// Editor submits work for review: `processing|in_revision -> human_check`.
pub fn submit_for_review(
    db: &Database,
    id: &str,
    editor_id: &str,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE orders SET status = 'human_check', version = version + 1, updated_at = ?3
             WHERE id = ?1 AND status IN ('processing', 'in_revision') AND assigned_editor = ?2",
            params![id, editor_id, now],
        )?;
        Ok(affected == 1)
    })
}

/// QC accept: `human_check -> completed`. Records the approver; never
/// touches the revision-round counter.
pub fn accept_qc(
    db: &Database,
    id: &str,
    approver_id: &str,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE orders SET status = 'completed', approved_by = ?2, approved_at = ?3,
             completed_at = ?3, version = version + 1, updated_at = ?3
             WHERE id = ?1 AND status = 'human_check'",
            params![id, approver_id, now],
        )?;
        Ok(affected == 1)
    })
}

/// QC reject: `human_check -> in_revision`. Stores the notes and increments
/// the round counter in the same statement so concurrent QC actions cannot
/// lose an update.
pub fn reject_qc(db: &Database, id: &str, notes: &str, now: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE orders SET status = 'in_revision', revision_notes = ?2,
             used_revision_rounds = used_revision_rounds + 1, version = version + 1,
             updated_at = ?3
             WHERE id = ?1 AND status = 'human_check'",
            params![id, notes, now],
        )?;
        Ok(affected == 1)
    })
}

/// Customer-initiated revision: `completed|delivered -> in_revision`,
/// consuming a round. The policy check happens in the caller; this only
/// enforces the state guard atomically.
pub fn request_revision(
    db: &Database,
    id: &str,
    notes: &str,
    now: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE orders SET status = 'in_revision', revision_notes = ?2,
             used_revision_rounds = used_revision_rounds + 1, version = version + 1,
             updated_at = ?3
             WHERE id = ?1 AND status IN ('completed', 'delivered')",
            params![id, notes, now],
        )?;
        Ok(affected == 1)
    })
}

/// Marks a completed order delivered: `completed -> delivered`.
pub fn mark_delivered(db: &Database, id: &str, now: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE orders SET status = 'delivered', version = version + 1, updated_at = ?2
             WHERE id = ?1 AND status = 'completed'",
            params![id, now],
        )?;
        Ok(affected == 1)
    })
}

/// Job-delivered cascade: force every non-cancelled order of the job to
/// `delivered`, regardless of its own state. Deliberate exception to the
/// normal transition guards. Returns the number of orders transitioned.
pub fn deliver_all_for_job(db: &Database, job_id: &str, now: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE orders SET status = 'delivered', version = version + 1, updated_at = ?2
             WHERE job_id = ?1 AND status NOT IN ('cancelled', 'delivered')",
            params![job_id, now],
        )?;
        Ok(affected)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{job_repo, tenant_repo};

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        tenant_repo::insert_tenant(
            &db,
            &tenant_repo::TenantRow {
                id: "t1".to_string(),
                name: "Studio".to_string(),
                revision_limit_enabled: false,
                revision_round_limit: 2,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        job_repo::insert(
            &db,
            &job_repo::JobRow {
                id: "j1".to_string(),
                tenant_id: "t1".to_string(),
                address: "12 Harbor Lane".to_string(),
                status: "booked".to_string(),
                customer_id: None,
                editor_of_record: None,
                delivered_at: None,
                cover_image: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
                updated_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        db
    }

    fn sample_order(id: &str) -> OrderRow {
        OrderRow {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            order_number: format!("ORD-{}", id),
            job_id: "j1".to_string(),
            customer_id: Some("c1".to_string()),
            assigned_editor: None,
            status: "pending".to_string(),
            used_revision_rounds: 0,
            revision_notes: None,
            accepted_at: None,
            completed_at: None,
            approved_at: None,
            approved_by: None,
            version: 0,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    const NOW: &str = "2026-01-02T00:00:00Z";

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();

        let found = find_by_id(&db, "o1").unwrap().unwrap();
        assert_eq!(found.status, "pending");
        assert_eq!(found.used_revision_rounds, 0);
        assert_eq!(found.version, 0);
    }

    #[test]
    fn test_find_by_number() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();

        let found = find_by_number(&db, "t1", "ORD-o1").unwrap();
        assert!(found.is_some());
        assert!(find_by_number(&db, "t2", "ORD-o1").unwrap().is_none());
    }

    #[test]
    fn test_assign_editor_cas() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();

        assert!(assign_editor(&db, "o1", "e1", 0, NOW).unwrap());
        let found = find_by_id(&db, "o1").unwrap().unwrap();
        assert_eq!(found.assigned_editor.as_deref(), Some("e1"));
        assert_eq!(found.version, 1);

        // Retry with the stale version loses.
        assert!(!assign_editor(&db, "o1", "e2", 0, NOW).unwrap());
        let found = find_by_id(&db, "o1").unwrap().unwrap();
        assert_eq!(found.assigned_editor.as_deref(), Some("e1"));
    }

    #[test]
    fn test_begin_processing_requires_assignment() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();

        // Not assigned yet.
        assert!(!begin_processing(&db, "o1", "e1", NOW).unwrap());

        assign_editor(&db, "o1", "e1", 0, NOW).unwrap();
        // Wrong editor.
        assert!(!begin_processing(&db, "o1", "e2", NOW).unwrap());
        assert!(begin_processing(&db, "o1", "e1", NOW).unwrap());

        let found = find_by_id(&db, "o1").unwrap().unwrap();
        assert_eq!(found.status, "processing");
        assert_eq!(found.accepted_at.as_deref(), Some(NOW));

        // Acceptance is exactly-once.
        assert!(!begin_processing(&db, "o1", "e1", NOW).unwrap());
    }

    #[test]
    fn test_decline_clears_editor() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();
        assign_editor(&db, "o1", "e1", 0, NOW).unwrap();

        assert!(decline(&db, "o1", "e1", NOW).unwrap());
        let found = find_by_id(&db, "o1").unwrap().unwrap();
        assert_eq!(found.status, "cancelled");
        assert!(found.assigned_editor.is_none());
    }

    #[test]
    fn test_submit_for_review_from_both_states() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();
        assign_editor(&db, "o1", "e1", 0, NOW).unwrap();
        begin_processing(&db, "o1", "e1", NOW).unwrap();

        assert!(submit_for_review(&db, "o1", "e1", NOW).unwrap());
        assert!(reject_qc(&db, "o1", "fix the sky", NOW).unwrap());
        // Resubmission from in_revision.
        assert!(submit_for_review(&db, "o1", "e1", NOW).unwrap());

        let found = find_by_id(&db, "o1").unwrap().unwrap();
        assert_eq!(found.status, "human_check");
        assert_eq!(found.used_revision_rounds, 1);
    }

    #[test]
    fn test_accept_qc_records_approver() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();
        assign_editor(&db, "o1", "e1", 0, NOW).unwrap();
        begin_processing(&db, "o1", "e1", NOW).unwrap();
        submit_for_review(&db, "o1", "e1", NOW).unwrap();

        assert!(accept_qc(&db, "o1", "admin1", NOW).unwrap());
        let found = find_by_id(&db, "o1").unwrap().unwrap();
        assert_eq!(found.status, "completed");
        assert_eq!(found.approved_by.as_deref(), Some("admin1"));
        assert_eq!(found.approved_at.as_deref(), Some(NOW));
        assert_eq!(found.used_revision_rounds, 0);

        // Accepting again is a stale-state no-op.
        assert!(!accept_qc(&db, "o1", "admin1", NOW).unwrap());
    }

    #[test]
    fn test_reject_qc_increments_rounds() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();
        assign_editor(&db, "o1", "e1", 0, NOW).unwrap();
        begin_processing(&db, "o1", "e1", NOW).unwrap();

        for round in 1..=3 {
            submit_for_review(&db, "o1", "e1", NOW).unwrap();
            assert!(reject_qc(&db, "o1", "more work", NOW).unwrap());
            let found = find_by_id(&db, "o1").unwrap().unwrap();
            assert_eq!(found.used_revision_rounds, round);
            assert_eq!(found.status, "in_revision");
            assert_eq!(found.revision_notes.as_deref(), Some("more work"));
        }
    }

    #[test]
    fn test_request_revision_state_guard() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();

        // Pending order cannot take a customer revision.
        assert!(!request_revision(&db, "o1", "tweak colors", NOW).unwrap());

        assign_editor(&db, "o1", "e1", 0, NOW).unwrap();
        begin_processing(&db, "o1", "e1", NOW).unwrap();
        submit_for_review(&db, "o1", "e1", NOW).unwrap();
        accept_qc(&db, "o1", "admin1", NOW).unwrap();

        assert!(request_revision(&db, "o1", "tweak colors", NOW).unwrap());
        let found = find_by_id(&db, "o1").unwrap().unwrap();
        assert_eq!(found.status, "in_revision");
        assert_eq!(found.used_revision_rounds, 1);
    }

    #[test]
    fn test_deliver_cascade_skips_cancelled() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();
        insert(&db, &sample_order("o2")).unwrap();
        insert(&db, &sample_order("o3")).unwrap();

        // o1 in processing, o2 completed, o3 cancelled.
        assign_editor(&db, "o1", "e1", 0, NOW).unwrap();
        begin_processing(&db, "o1", "e1", NOW).unwrap();
        assign_editor(&db, "o2", "e1", 0, NOW).unwrap();
        begin_processing(&db, "o2", "e1", NOW).unwrap();
        submit_for_review(&db, "o2", "e1", NOW).unwrap();
        accept_qc(&db, "o2", "admin1", NOW).unwrap();
        assign_editor(&db, "o3", "e1", 0, NOW).unwrap();
        decline(&db, "o3", "e1", NOW).unwrap();

        let affected = deliver_all_for_job(&db, "j1", NOW).unwrap();
        assert_eq!(affected, 2);

        assert_eq!(find_by_id(&db, "o1").unwrap().unwrap().status, "delivered");
        assert_eq!(find_by_id(&db, "o2").unwrap().unwrap().status, "delivered");
        assert_eq!(find_by_id(&db, "o3").unwrap().unwrap().status, "cancelled");
    }

    #[test]
    fn test_list_assignable() {
        let db = test_db();
        insert(&db, &sample_order("o1")).unwrap();
        insert(&db, &sample_order("o2")).unwrap();

        assign_editor(&db, "o2", "e1", 0, NOW).unwrap();

        let pool = list_assignable(&db, "t1").unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, "o1");
    }
}
