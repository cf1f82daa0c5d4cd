//! File comment repository — threaded notes on a single deliverable.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A comment on a deliverable.
#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: String,
    pub deliverable_id: String,
    pub author_id: String,
    pub author_role: String,
    pub body: String,
    /// `pending`, `in_progress` or `resolved`.
    pub status: String,
    pub created_at: String,
}

impl CommentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            deliverable_id: row.get("deliverable_id")?,
            author_id: row.get("author_id")?,
            author_role: row.get("author_role")?,
            body: row.get("body")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(db: &Database, comment: &CommentRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO file_comments (id, deliverable_id, author_id, author_role, body,
             status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                comment.id,
                comment.deliverable_id,
                comment.author_id,
                comment.author_role,
                comment.body,
                comment.status,
                comment.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn list_by_deliverable(
    db: &Database,
    deliverable_id: &str,
) -> Result<Vec<CommentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM file_comments WHERE deliverable_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows: Vec<CommentRow> = stmt
            .query_map(params![deliverable_id], CommentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn set_status(db: &Database, id: &str, status: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE file_comments SET status = ?2 WHERE id = ?1",
            params![id, status],
        )?;
        Ok(())
    })
}
