//! Activity log repository — append-only who/when/what-changed records.
//!
//! Every workflow transition appends here. Rows are immutable; there is no
//! update or delete operation on purpose.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// An immutable activity record.
#[derive(Debug, Clone)]
pub struct ActivityRow {
    pub id: String,
    pub tenant_id: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub actor_id: String,
    pub action: String,
    pub detail: Option<String>,
    pub created_at: String,
}

impl ActivityRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            entity_kind: row.get("entity_kind")?,
            entity_id: row.get("entity_id")?,
            actor_id: row.get("actor_id")?,
            action: row.get("action")?,
            detail: row.get("detail")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn append(db: &Database, activity: &ActivityRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO activity_log (id, tenant_id, entity_kind, entity_id, actor_id,
             action, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                activity.id,
                activity.tenant_id,
                activity.entity_kind,
                activity.entity_id,
                activity.actor_id,
                activity.action,
                activity.detail,
                activity.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Lists activity for one entity, oldest first.
pub fn list_for_entity(
    db: &Database,
    entity_kind: &str,
    entity_id: &str,
) -> Result<Vec<ActivityRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM activity_log WHERE entity_kind = ?1 AND entity_id = ?2
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows: Vec<ActivityRow> = stmt
            .query_map(params![entity_kind, entity_id], ActivityRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
