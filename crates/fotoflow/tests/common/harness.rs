//! Test harness for isolated integration test execution.
//!
//! Every harness gets its own in-memory database seeded with one tenant,
//! two active editor memberships and two customers, plus a temp directory
//! backing the filesystem object store. Nothing is shared between tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use fotoflow::broadcast::RecordingCalendarSink;
use fotoflow::db::{job_repo, order_repo, tenant_repo};
use fotoflow::{
    Database, FsObjectStore, NotificationBroadcaster, Organizer, Principal, Role, ServiceRequest,
    WorkflowService,
};

/// Tenant id every seeded row belongs to.
pub const TENANT: &str = "t1";
/// Customer bound by the tenant's revision policy.
pub const CUSTOMER: &str = "c1";
/// Customer with an explicit unlimited revision override.
pub const CUSTOMER_UNLIMITED: &str = "c-unlimited";

/// Full engine instance over isolated state.
pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub workflow: WorkflowService,
    pub organizer: Organizer,
    pub calendar: Arc<RecordingCalendarSink>,
    pub notifications: NotificationBroadcaster,
}

impl TestHarness {
    /// Seeds tenant `t1` with the revision limit enabled at 2 rounds.
    pub fn new() -> Self {
        Self::with_revision_limit(true, 2)
    }

    pub fn with_revision_limit(enabled: bool, rounds: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to create test database");

        tenant_repo::insert_tenant(
            &db,
            &tenant_repo::TenantRow {
                id: TENANT.to_string(),
                name: "Studio North".to_string(),
                revision_limit_enabled: enabled,
                revision_round_limit: rounds,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        tenant_repo::insert_customer(
            &db,
            &tenant_repo::CustomerRow {
                id: CUSTOMER.to_string(),
                tenant_id: TENANT.to_string(),
                name: "Acme Realty".to_string(),
                revision_override: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        tenant_repo::insert_customer(
            &db,
            &tenant_repo::CustomerRow {
                id: CUSTOMER_UNLIMITED.to_string(),
                tenant_id: TENANT.to_string(),
                name: "Harbor Homes".to_string(),
                revision_override: Some("unlimited".to_string()),
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        for editor_id in ["e1", "e2"] {
            tenant_repo::insert_membership(
                &db,
                &tenant_repo::MembershipRow {
                    editor_id: editor_id.to_string(),
                    tenant_id: TENANT.to_string(),
                    status: "active".to_string(),
                    created_at: "2026-01-01T00:00:00Z".to_string(),
                },
            )
            .unwrap();
        }

        let notifications = NotificationBroadcaster::new(64);
        let calendar = Arc::new(RecordingCalendarSink::new());
        let workflow =
            WorkflowService::new(db.clone(), notifications.clone(), calendar.clone());
        let organizer = Organizer::new(
            db.clone(),
            Arc::new(FsObjectStore::new(temp_dir.path())),
            60,
        );

        Self {
            temp_dir,
            db,
            workflow,
            organizer,
            calendar,
            notifications,
        }
    }

    /// Root of the filesystem object store, for on-disk assertions.
    pub fn storage_root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn owner(&self) -> Principal {
        Principal::new("owner1", Role::TenantOwner, TENANT)
    }

    pub fn editor(&self, id: &str) -> Principal {
        Principal::new(id, Role::Editor, TENANT)
    }

    pub fn customer(&self) -> Principal {
        Principal::new(CUSTOMER, Role::Customer, TENANT)
    }

    pub fn one_service(&self) -> Vec<ServiceRequest> {
        vec![ServiceRequest {
            service_ref: "photo-editing".to_string(),
            quantity: 25,
            instructions: Some("warm tones".to_string()),
            export_types: vec!["jpeg".to_string(), "web".to_string()],
        }]
    }

    /// Books a job for the default customer.
    pub fn booked_job(&self) -> job_repo::JobRow {
        self.workflow
            .create_job(&self.owner(), "12 Harbor Lane", Some(CUSTOMER))
            .unwrap()
    }

    /// Creates a pending, unassigned order on the job.
    pub fn pending_order(&self, job_id: &str) -> order_repo::OrderRow {
        self.workflow
            .create_order(&self.owner(), job_id, Some(CUSTOMER), &self.one_service())
            .unwrap()
    }

    /// Creates an order and drives it to `processing` under editor `e1`.
    pub fn order_in_processing(&self, job_id: &str) -> order_repo::OrderRow {
        let order = self.pending_order(job_id);
        self.workflow
            .assign_order(&self.owner(), &order.id, "e1")
            .unwrap();
        self.workflow
            .accept_order(&self.editor("e1"), &order.id)
            .unwrap()
    }

    /// Creates an order and drives it to `human_check` under editor `e1`.
    pub fn order_in_human_check(&self, job_id: &str) -> order_repo::OrderRow {
        let order = self.order_in_processing(job_id);
        self.workflow
            .submit_for_review(&self.editor("e1"), &order.id)
            .unwrap()
    }

    pub fn reload_order(&self, order_id: &str) -> order_repo::OrderRow {
        order_repo::find_by_id(&self.db, order_id).unwrap().unwrap()
    }

    pub fn reload_job(&self, job_id: &str) -> job_repo::JobRow {
        job_repo::find_by_id(&self.db, job_id).unwrap().unwrap()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
