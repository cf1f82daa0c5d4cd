//! Deliverable organizer — folders, uploads, visibility and download links.
//!
//! Folders are display groupings keyed by `(job_id, path)`; the opaque token
//! allocated at creation is the storage path segment, so display renames
//! never move bytes. Creation order is row first, placeholder object second:
//! a folder that exists in the database but not yet in storage is harmless,
//! the reverse would leak unreferenced objects.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::db::{comment_repo, deliverable_repo, folder_repo, Database};
use crate::error::WorkflowError;
use crate::storage::{paths, ObjectStore};
use crate::workflow::status::DeliverableStatus;

/// Who a folder listing is rendered for. Customers never see hidden
/// folders; this is a display filter, not an access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Internal,
    Customer,
}

/// Organizes a job's deliverables into folders backed by object storage.
#[derive(Clone)]
pub struct Organizer {
    db: Database,
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
}

impl Organizer {
    pub fn new(db: Database, store: Arc<dyn ObjectStore>, url_ttl_minutes: i64) -> Self {
        Self {
            db,
            store,
            url_ttl: Duration::minutes(url_ttl_minutes),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates a folder under an optional parent. The row is persisted
    /// before the `.keep` placeholder object is written.
    pub fn create_folder(
        &self,
        principal: &Principal,
        job_id: &str,
        parent_path: Option<&str>,
        name: &str,
        order_id: Option<&str>,
    ) -> Result<folder_repo::FolderRow, WorkflowError> {
        require_not_customer(principal)?;
        validate_name(name)?;

        let path = match parent_path {
            Some(parent) => {
                if folder_repo::find_by_path(&self.db, job_id, parent)?.is_none() {
                    return Err(WorkflowError::NotFound {
                        entity: "folder",
                        id: parent.to_string(),
                    });
                }
                format!("{}/{}", parent, name)
            }
            None => name.to_string(),
        };

        if folder_repo::find_by_path(&self.db, job_id, &path)?.is_some() {
            return Err(WorkflowError::Conflict {
                reason: format!("folder '{}' already exists", path),
            });
        }

        let folder = folder_repo::FolderRow {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            order_id: order_id.map(|o| o.to_string()),
            parent_path: parent_path.map(|p| p.to_string()),
            path,
            editor_name: name.to_string(),
            tenant_name: None,
            token: Uuid::new_v4().simple().to_string(),
            visible: true,
            display_order: 0,
            created_at: crate::workflow::now_rfc3339(),
        };
        folder_repo::insert(&self.db, &folder)?;
        self.store
            .put(&paths::placeholder_path(job_id, &folder.token), &[])?;

        tracing::info!(job_id, path = %folder.path, token = %folder.token, "folder created");
        Ok(folder)
    }

    /// Uploads a deliverable into a folder. A `completed` deliverable with
    /// the same original name in the same folder is replaced: its blob and
    /// row are removed first, so the folder converges to exactly one row
    /// per `(folder, original_name)`.
    #[allow(clippy::too_many_arguments)]
    pub fn upload_deliverable(
        &self,
        principal: &Principal,
        job_id: &str,
        folder_path: &str,
        original_name: &str,
        content: &[u8],
        order_id: Option<&str>,
        status: DeliverableStatus,
    ) -> Result<deliverable_repo::DeliverableRow, WorkflowError> {
        require_not_customer(principal)?;
        validate_name(original_name)?;

        let folder = folder_repo::find_by_path(&self.db, job_id, folder_path)?.ok_or(
            WorkflowError::NotFound {
                entity: "folder",
                id: folder_path.to_string(),
            },
        )?;

        if status == DeliverableStatus::Completed {
            if let Some(existing) = deliverable_repo::find_completed_duplicate(
                &self.db,
                job_id,
                folder_path,
                original_name,
            )? {
                // Old blob removal is best-effort; the row removal is not.
                if let Err(e) = self.store.delete(&existing.storage_path) {
                    tracing::warn!(deliverable_id = %existing.id, error = %e,
                        "failed to delete replaced blob");
                }
                deliverable_repo::delete(&self.db, &existing.id)?;
            }
        }

        let storage_path = paths::deliverable_path(job_id, &folder.token, original_name);
        self.store.put(&storage_path, content)?;

        let deliverable = deliverable_repo::DeliverableRow {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            order_id: order_id.map(|o| o.to_string()),
            editor_id: principal.user_id.clone(),
            folder_path: folder.path.clone(),
            folder_token: folder.token.clone(),
            file_name: original_name.to_string(),
            original_name: original_name.to_string(),
            size: content.len() as i64,
            mime_type: mime_guess::from_path(original_name)
                .first_or_octet_stream()
                .to_string(),
            storage_path,
            download_url: None,
            url_expires_at: None,
            status: status.as_str().to_string(),
            created_at: crate::workflow::now_rfc3339(),
        };
        deliverable_repo::insert(&self.db, &deliverable)?;

        tracing::info!(job_id, folder = %folder.path, name = original_name,
            size = deliverable.size, "deliverable uploaded");
        Ok(deliverable)
    }

    /// Deletes a folder and everything beneath it. Refused while any
    /// deliverable in the subtree is bound to an order; on refusal nothing
    /// is touched. Blob deletion is best-effort per file.
    pub fn delete_folder(
        &self,
        principal: &Principal,
        job_id: &str,
        folder_path: &str,
    ) -> Result<(), WorkflowError> {
        require_not_customer(principal)?;
        let folder = folder_repo::find_by_path(&self.db, job_id, folder_path)?.ok_or(
            WorkflowError::NotFound {
                entity: "folder",
                id: folder_path.to_string(),
            },
        )?;

        let bound =
            deliverable_repo::count_order_bound_in_subtree(&self.db, job_id, folder_path)?;
        if bound > 0 {
            return Err(WorkflowError::Conflict {
                reason: format!("{} deliverables in this folder belong to an order", bound),
            });
        }

        let deliverables =
            deliverable_repo::list_by_folder_subtree(&self.db, job_id, folder_path)?;
        for deliverable in &deliverables {
            if let Err(e) = self.store.delete(&deliverable.storage_path) {
                tracing::warn!(deliverable_id = %deliverable.id, error = %e,
                    "failed to delete blob, continuing");
            }
            deliverable_repo::delete(&self.db, &deliverable.id)?;
        }

        // Placeholders of the folder and its descendants.
        let subtree_prefix = format!("{}/", folder.path);
        for row in folder_repo::list_by_job(&self.db, job_id)? {
            if row.path == folder.path || row.path.starts_with(&subtree_prefix) {
                if let Err(e) = self.store.delete(&paths::placeholder_path(job_id, &row.token)) {
                    tracing::warn!(folder = %row.path, error = %e,
                        "failed to delete placeholder, continuing");
                }
            }
        }

        let removed = folder_repo::delete_subtree(&self.db, job_id, folder_path)?;
        tracing::info!(job_id, folder = folder_path, removed,
            files = deliverables.len(), "folder deleted");
        Ok(())
    }

    /// Toggles whether customers see the folder.
    pub fn set_folder_visibility(
        &self,
        principal: &Principal,
        job_id: &str,
        folder_path: &str,
        visible: bool,
    ) -> Result<(), WorkflowError> {
        require_not_customer(principal)?;
        self.folder_by_path(job_id, folder_path)?;
        folder_repo::set_visibility(&self.db, job_id, folder_path, visible)?;
        Ok(())
    }

    /// Renames a folder's display name. Tenant staff write the override
    /// (which wins for display); editors write the base name underneath it.
    /// The storage path never changes.
    pub fn rename_folder(
        &self,
        principal: &Principal,
        job_id: &str,
        folder_path: &str,
        name: &str,
    ) -> Result<(), WorkflowError> {
        validate_name(name)?;
        self.folder_by_path(job_id, folder_path)?;
        if principal.role.is_tenant_staff() {
            folder_repo::set_tenant_name(&self.db, job_id, folder_path, Some(name))?;
        } else if principal.role == Role::Editor {
            folder_repo::set_editor_name(&self.db, job_id, folder_path, name)?;
        } else {
            return Err(WorkflowError::Forbidden {
                reason: "customers cannot rename folders".to_string(),
            });
        }
        Ok(())
    }

    /// Removes the tenant display override, falling back to the editor name.
    pub fn clear_display_override(
        &self,
        principal: &Principal,
        job_id: &str,
        folder_path: &str,
    ) -> Result<(), WorkflowError> {
        if !principal.role.is_tenant_staff() {
            return Err(WorkflowError::Forbidden {
                reason: "only tenant staff clear the display override".to_string(),
            });
        }
        self.folder_by_path(job_id, folder_path)?;
        folder_repo::set_tenant_name(&self.db, job_id, folder_path, None)?;
        Ok(())
    }

    pub fn set_display_order(
        &self,
        principal: &Principal,
        job_id: &str,
        folder_path: &str,
        display_order: i64,
    ) -> Result<(), WorkflowError> {
        require_not_customer(principal)?;
        self.folder_by_path(job_id, folder_path)?;
        folder_repo::set_display_order(&self.db, job_id, folder_path, display_order)?;
        Ok(())
    }

    /// Binds a standalone folder to an order, which blocks its deletion via
    /// the order-bound guard once deliverables land in it.
    pub fn bind_folder_to_order(
        &self,
        principal: &Principal,
        job_id: &str,
        folder_path: &str,
        order_id: &str,
    ) -> Result<(), WorkflowError> {
        require_not_customer(principal)?;
        self.folder_by_path(job_id, folder_path)?;
        folder_repo::bind_to_order(&self.db, job_id, folder_path, order_id)?;
        Ok(())
    }

    /// Lists a job's folders for the given audience. The customer audience
    /// does not see hidden folders.
    pub fn list_folders(
        &self,
        job_id: &str,
        audience: Audience,
    ) -> Result<Vec<folder_repo::FolderRow>, WorkflowError> {
        let mut folders = folder_repo::list_by_job(&self.db, job_id)?;
        if audience == Audience::Customer {
            folders.retain(|f| f.visible);
        }
        Ok(folders)
    }

    /// Returns a signed download URL for a deliverable, regenerating it
    /// (and persisting the new expiry) when the stored one has expired.
    pub fn deliverable_url(&self, deliverable_id: &str) -> Result<String, WorkflowError> {
        let deliverable = deliverable_repo::find_by_id(&self.db, deliverable_id)?.ok_or(
            WorkflowError::NotFound {
                entity: "deliverable",
                id: deliverable_id.to_string(),
            },
        )?;

        if let (Some(url), Some(expires_raw)) = (
            deliverable.download_url.as_deref(),
            deliverable.url_expires_at.as_deref(),
        ) {
            if let Ok(expires) = expires_raw.parse::<DateTime<Utc>>() {
                if expires > Utc::now() {
                    return Ok(url.to_string());
                }
            }
        }

        let expires_at = Utc::now() + self.url_ttl;
        let url = self.store.signed_url(&deliverable.storage_path, expires_at)?;
        deliverable_repo::set_download_url(
            &self.db,
            &deliverable.id,
            &url,
            &expires_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        )?;
        Ok(url)
    }

    /// Adds a comment on a deliverable.
    pub fn add_comment(
        &self,
        principal: &Principal,
        deliverable_id: &str,
        body: &str,
    ) -> Result<comment_repo::CommentRow, WorkflowError> {
        if body.trim().is_empty() {
            return Err(WorkflowError::Validation {
                message: "comment body must not be empty".to_string(),
            });
        }
        if deliverable_repo::find_by_id(&self.db, deliverable_id)?.is_none() {
            return Err(WorkflowError::NotFound {
                entity: "deliverable",
                id: deliverable_id.to_string(),
            });
        }

        let comment = comment_repo::CommentRow {
            id: Uuid::new_v4().to_string(),
            deliverable_id: deliverable_id.to_string(),
            author_id: principal.user_id.clone(),
            author_role: principal.role.as_str().to_string(),
            body: body.to_string(),
            status: "pending".to_string(),
            created_at: crate::workflow::now_rfc3339(),
        };
        comment_repo::insert(&self.db, &comment)?;
        Ok(comment)
    }

    pub fn set_comment_status(
        &self,
        principal: &Principal,
        comment_id: &str,
        status: &str,
    ) -> Result<(), WorkflowError> {
        require_not_customer(principal)?;
        if !matches!(status, "pending" | "in_progress" | "resolved") {
            return Err(WorkflowError::Validation {
                message: format!("unknown comment status '{}'", status),
            });
        }
        comment_repo::set_status(&self.db, comment_id, status)?;
        Ok(())
    }

    pub fn list_comments(
        &self,
        deliverable_id: &str,
    ) -> Result<Vec<comment_repo::CommentRow>, WorkflowError> {
        Ok(comment_repo::list_by_deliverable(&self.db, deliverable_id)?)
    }

    fn folder_by_path(
        &self,
        job_id: &str,
        folder_path: &str,
    ) -> Result<folder_repo::FolderRow, WorkflowError> {
        folder_repo::find_by_path(&self.db, job_id, folder_path)?.ok_or(WorkflowError::NotFound {
            entity: "folder",
            id: folder_path.to_string(),
        })
    }
}

fn require_not_customer(principal: &Principal) -> Result<(), WorkflowError> {
    if principal.role == Role::Customer {
        Err(WorkflowError::Forbidden {
            reason: "customers cannot modify deliverables".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Folder and file names are single path segments.
fn validate_name(name: &str) -> Result<(), WorkflowError> {
    if name.trim().is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(WorkflowError::Validation {
            message: format!("invalid name '{}'", name),
        });
    }
    Ok(())
}
