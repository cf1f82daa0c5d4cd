//! Deliverable repository — uploaded files produced by editors.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw deliverable row from the database.
#[derive(Debug, Clone)]
pub struct DeliverableRow {
    pub id: String,
    pub job_id: String,
    pub order_id: Option<String>,
    pub editor_id: String,
    pub folder_path: String,
    pub folder_token: String,
    pub file_name: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub download_url: Option<String>,
    pub url_expires_at: Option<String>,
    /// `for_editing` (client-supplied input) or `completed` (editor output).
    pub status: String,
    pub created_at: String,
}

impl DeliverableRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            order_id: row.get("order_id")?,
            editor_id: row.get("editor_id")?,
            folder_path: row.get("folder_path")?,
            folder_token: row.get("folder_token")?,
            file_name: row.get("file_name")?,
            original_name: row.get("original_name")?,
            size: row.get("size")?,
            mime_type: row.get("mime_type")?,
            storage_path: row.get("storage_path")?,
            download_url: row.get("download_url")?,
            url_expires_at: row.get("url_expires_at")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(db: &Database, deliverable: &DeliverableRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO deliverables (id, job_id, order_id, editor_id, folder_path,
             folder_token, file_name, original_name, size, mime_type, storage_path,
             download_url, url_expires_at, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                deliverable.id,
                deliverable.job_id,
                deliverable.order_id,
                deliverable.editor_id,
                deliverable.folder_path,
                deliverable.folder_token,
                deliverable.file_name,
                deliverable.original_name,
                deliverable.size,
                deliverable.mime_type,
                deliverable.storage_path,
                deliverable.download_url,
                deliverable.url_expires_at,
                deliverable.status,
                deliverable.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<DeliverableRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM deliverables WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], DeliverableRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Finds a `completed` deliverable in a folder by its original file name.
/// Used for duplicate-replacement on upload.
pub fn find_completed_duplicate(
    db: &Database,
    job_id: &str,
    folder_path: &str,
    original_name: &str,
) -> Result<Option<DeliverableRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM deliverables WHERE job_id = ?1 AND folder_path = ?2
             AND original_name = ?3 AND status = 'completed'",
        )?;
        let mut rows = stmt.query_map(
            params![job_id, folder_path, original_name],
            DeliverableRow::from_row,
        )?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists deliverables in a folder.
pub fn list_by_folder(
    db: &Database,
    job_id: &str,
    folder_path: &str,
) -> Result<Vec<DeliverableRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM deliverables WHERE job_id = ?1 AND folder_path = ?2
             ORDER BY original_name ASC",
        )?;
        let rows: Vec<DeliverableRow> = stmt
            .query_map(params![job_id, folder_path], DeliverableRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists deliverables under a folder subtree (the folder and descendants).
pub fn list_by_folder_subtree(
    db: &Database,
    job_id: &str,
    folder_path: &str,
) -> Result<Vec<DeliverableRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM deliverables WHERE job_id = ?1
             AND (folder_path = ?2 OR folder_path LIKE ?3 || '/%' ESCAPE '\\')
             ORDER BY folder_path ASC, original_name ASC",
        )?;
        let rows: Vec<DeliverableRow> = stmt
            .query_map(
                params![job_id, folder_path, super::escape_like(folder_path)],
                DeliverableRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts deliverables under a folder subtree that are bound to an order.
/// A non-zero count blocks folder deletion.
pub fn count_order_bound_in_subtree(
    db: &Database,
    job_id: &str,
    folder_path: &str,
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM deliverables WHERE job_id = ?1
             AND (folder_path = ?2 OR folder_path LIKE ?3 || '/%' ESCAPE '\\')
             AND order_id IS NOT NULL",
            params![job_id, folder_path, super::escape_like(folder_path)],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

pub fn delete(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("DELETE FROM deliverables WHERE id = ?1", params![id])?;
        Ok(())
    })
}

/// Persists a freshly generated signed URL and its expiry.
pub fn set_download_url(
    db: &Database,
    id: &str,
    url: &str,
    expires_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE deliverables SET download_url = ?2, url_expires_at = ?3 WHERE id = ?1",
            params![id, url, expires_at],
        )?;
        Ok(())
    })
}
