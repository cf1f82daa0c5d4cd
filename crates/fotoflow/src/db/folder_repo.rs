//! Folder repository — named, tokenized groupings of deliverables.
//!
//! Folders are keyed by `(job_id, path)`. The opaque `token` is the
//! object-storage path segment, so renaming a folder never moves bytes.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw folder row from the database.
#[derive(Debug, Clone)]
pub struct FolderRow {
    pub id: String,
    pub job_id: String,
    /// Standalone folders (not yet bound to an order) carry NULL here.
    pub order_id: Option<String>,
    pub parent_path: Option<String>,
    pub path: String,
    pub editor_name: String,
    /// Tenant-owner display override; wins over `editor_name` for display.
    pub tenant_name: Option<String>,
    pub token: String,
    pub visible: bool,
    pub display_order: i64,
    pub created_at: String,
}

impl FolderRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            order_id: row.get("order_id")?,
            parent_path: row.get("parent_path")?,
            path: row.get("path")?,
            editor_name: row.get("editor_name")?,
            tenant_name: row.get("tenant_name")?,
            token: row.get("token")?,
            visible: row.get("visible")?,
            display_order: row.get("display_order")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Display name precedence: tenant override wins, editor name otherwise.
    pub fn display_name(&self) -> &str {
        self.tenant_name.as_deref().unwrap_or(&self.editor_name)
    }
}

pub fn insert(db: &Database, folder: &FolderRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO folders (id, job_id, order_id, parent_path, path, editor_name,
             tenant_name, token, visible, display_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                folder.id,
                folder.job_id,
                folder.order_id,
                folder.parent_path,
                folder.path,
                folder.editor_name,
                folder.tenant_name,
                folder.token,
                folder.visible,
                folder.display_order,
                folder.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_path(
    db: &Database,
    job_id: &str,
    path: &str,
) -> Result<Option<FolderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM folders WHERE job_id = ?1 AND path = ?2")?;
        let mut rows = stmt.query_map(params![job_id, path], FolderRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists folders for a job in display order.
pub fn list_by_job(db: &Database, job_id: &str) -> Result<Vec<FolderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM folders WHERE job_id = ?1 ORDER BY display_order ASC, path ASC",
        )?;
        let rows: Vec<FolderRow> = stmt
            .query_map(params![job_id], FolderRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Sets the editor-chosen display name.
pub fn set_editor_name(
    db: &Database,
    job_id: &str,
    path: &str,
    name: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE folders SET editor_name = ?3 WHERE job_id = ?1 AND path = ?2",
            params![job_id, path, name],
        )?;
        Ok(())
    })
}

/// Sets (or clears) the tenant-owner display override.
pub fn set_tenant_name(
    db: &Database,
    job_id: &str,
    path: &str,
    name: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE folders SET tenant_name = ?3 WHERE job_id = ?1 AND path = ?2",
            params![job_id, path, name],
        )?;
        Ok(())
    })
}

pub fn set_visibility(
    db: &Database,
    job_id: &str,
    path: &str,
    visible: bool,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE folders SET visible = ?3 WHERE job_id = ?1 AND path = ?2",
            params![job_id, path, visible],
        )?;
        Ok(())
    })
}

pub fn set_display_order(
    db: &Database,
    job_id: &str,
    path: &str,
    display_order: i64,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE folders SET display_order = ?3 WHERE job_id = ?1 AND path = ?2",
            params![job_id, path, display_order],
        )?;
        Ok(())
    })
}

/// Binds a standalone folder to an order.
pub fn bind_to_order(
    db: &Database,
    job_id: &str,
    path: &str,
    order_id: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE folders SET order_id = ?3 WHERE job_id = ?1 AND path = ?2",
            params![job_id, path, order_id],
        )?;
        Ok(())
    })
}

/// Deletes a folder row and all descendant folder rows. The prefix is
/// LIKE-escaped so metacharacters in folder names match literally.
pub fn delete_subtree(db: &Database, job_id: &str, path: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "DELETE FROM folders WHERE job_id = ?1
             AND (path = ?2 OR path LIKE ?3 || '/%' ESCAPE '\\')",
            params![job_id, path, super::escape_like(path)],
        )?;
        Ok(affected)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_folder(id: &str, path: &str) -> FolderRow {
        FolderRow {
            id: id.to_string(),
            job_id: "j1".to_string(),
            order_id: None,
            parent_path: None,
            path: path.to_string(),
            editor_name: path.to_string(),
            tenant_name: None,
            token: format!("tok-{}", id),
            visible: true,
            display_order: 0,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find_by_path() {
        let db = test_db();
        insert(&db, &sample_folder("f1", "Photos")).unwrap();

        let found = find_by_path(&db, "j1", "Photos").unwrap().unwrap();
        assert_eq!(found.token, "tok-f1");
        assert!(found.visible);
        assert!(find_by_path(&db, "j1", "Other").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let db = test_db();
        insert(&db, &sample_folder("f1", "Photos")).unwrap();

        let result = insert(&db, &sample_folder("f2", "Photos"));
        assert!(result.is_err());
    }

    #[test]
    fn test_display_name_precedence() {
        let db = test_db();
        insert(&db, &sample_folder("f1", "Photos")).unwrap();

        let found = find_by_path(&db, "j1", "Photos").unwrap().unwrap();
        assert_eq!(found.display_name(), "Photos");

        set_tenant_name(&db, "j1", "Photos", Some("Final Gallery")).unwrap();
        let found = find_by_path(&db, "j1", "Photos").unwrap().unwrap();
        assert_eq!(found.display_name(), "Final Gallery");

        // Editor rename does not beat the tenant override.
        set_editor_name(&db, "j1", "Photos", "Edited Photos").unwrap();
        let found = find_by_path(&db, "j1", "Photos").unwrap().unwrap();
        assert_eq!(found.display_name(), "Final Gallery");

        set_tenant_name(&db, "j1", "Photos", None).unwrap();
        let found = find_by_path(&db, "j1", "Photos").unwrap().unwrap();
        assert_eq!(found.display_name(), "Edited Photos");
    }

    #[test]
    fn test_visibility_toggle() {
        let db = test_db();
        insert(&db, &sample_folder("f1", "Photos")).unwrap();

        set_visibility(&db, "j1", "Photos", false).unwrap();
        let found = find_by_path(&db, "j1", "Photos").unwrap().unwrap();
        assert!(!found.visible);
    }

    #[test]
    fn test_list_ordering() {
        let db = test_db();
        let mut a = sample_folder("f1", "B-Roll");
        a.display_order = 2;
        let mut b = sample_folder("f2", "Photos");
        b.display_order = 1;
        insert(&db, &a).unwrap();
        insert(&db, &b).unwrap();

        let rows = list_by_job(&db, "j1").unwrap();
        assert_eq!(rows[0].path, "Photos");
        assert_eq!(rows[1].path, "B-Roll");
    }

    #[test]
    fn test_delete_subtree() {
        let db = test_db();
        insert(&db, &sample_folder("f1", "Photos")).unwrap();
        let mut child = sample_folder("f2", "Photos/Raw");
        child.parent_path = Some("Photos".to_string());
        insert(&db, &child).unwrap();
        insert(&db, &sample_folder("f3", "PhotosExtra")).unwrap();

        let deleted = delete_subtree(&db, "j1", "Photos").unwrap();
        assert_eq!(deleted, 2);
        assert!(find_by_path(&db, "j1", "Photos").unwrap().is_none());
        assert!(find_by_path(&db, "j1", "Photos/Raw").unwrap().is_none());
        // Prefix match must not swallow sibling names.
        assert!(find_by_path(&db, "j1", "PhotosExtra").unwrap().is_some());
    }

    #[test]
    fn test_delete_subtree_treats_like_metacharacters_literally() {
        let db = test_db();
        insert(&db, &sample_folder("f1", "a_b")).unwrap();
        insert(&db, &sample_folder("f2", "axb")).unwrap();
        let mut child = sample_folder("f3", "axb/Raw");
        child.parent_path = Some("axb".to_string());
        insert(&db, &child).unwrap();

        // `_` in the prefix must not act as a single-character wildcard.
        let deleted = delete_subtree(&db, "j1", "a_b").unwrap();
        assert_eq!(deleted, 1);
        assert!(find_by_path(&db, "j1", "a_b").unwrap().is_none());
        assert!(find_by_path(&db, "j1", "axb").unwrap().is_some());
        assert!(find_by_path(&db, "j1", "axb/Raw").unwrap().is_some());

        insert(&db, &sample_folder("f4", "50%")).unwrap();
        insert(&db, &sample_folder("f5", "50mm")).unwrap();
        let mut lens = sample_folder("f6", "50mm/Raw");
        lens.parent_path = Some("50mm".to_string());
        insert(&db, &lens).unwrap();

        let deleted = delete_subtree(&db, "j1", "50%").unwrap();
        assert_eq!(deleted, 1);
        assert!(find_by_path(&db, "j1", "50mm").unwrap().is_some());
        assert!(find_by_path(&db, "j1", "50mm/Raw").unwrap().is_some());
    }

    #[test]
    fn test_bind_to_order() {
        let db = test_db();
        insert(&db, &sample_folder("f1", "Photos")).unwrap();

        bind_to_order(&db, "j1", "Photos", "o1").unwrap();
        let found = find_by_path(&db, "j1", "Photos").unwrap().unwrap();
        assert_eq!(found.order_id.as_deref(), Some("o1"));
    }
}
