//! Workflow service — jobs, appointments, orders and their transitions.
//!
//! Every operation takes a trusted `Principal` and enforces tenant, role and
//! assignment guards before touching state. State transitions are conditional
//! single-statement updates in the repo layer; a guard that matches no row
//! surfaces here as `Conflict`. Side effects (activity log, notifications,
//! calendar sync) run after the primary write and never roll it back.

pub mod assignment;
pub mod qc;
pub mod revision;
pub mod status;

pub use revision::{RevisionDecision, RoundLimit};
pub use status::{AppointmentStatus, DeliverableStatus, JobStatus, OrderStatus};

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::auth::Principal;
use crate::broadcast::{CalendarSink, Notification, NotificationBroadcaster, NotificationKind};
use crate::db::{
    activity_repo, appointment_repo, deliverable_repo, job_repo, order_repo, order_service_repo,
    review_repo, Database,
};
use crate::error::WorkflowError;

/// A requested service line item on a new order.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub service_ref: String,
    pub quantity: u32,
    pub instructions: Option<String>,
    pub export_types: Vec<String>,
}

/// The workflow engine. Cheap to clone via the inner handles.
#[derive(Clone)]
pub struct WorkflowService {
    db: Database,
    notifications: NotificationBroadcaster,
    calendar: Arc<dyn CalendarSink>,
}

impl WorkflowService {
    pub fn new(
        db: Database,
        notifications: NotificationBroadcaster,
        calendar: Arc<dyn CalendarSink>,
    ) -> Self {
        Self {
            db,
            notifications,
            calendar,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Books a new job. Tenant staff only.
    pub fn create_job(
        &self,
        principal: &Principal,
        address: &str,
        customer_id: Option<&str>,
    ) -> Result<job_repo::JobRow, WorkflowError> {
        self.require_staff(principal)?;
        if address.trim().is_empty() {
            return Err(WorkflowError::Validation {
                message: "address must not be empty".to_string(),
            });
        }

        let now = now_rfc3339();
        let job = job_repo::JobRow {
            id: Uuid::new_v4().to_string(),
            tenant_id: principal.tenant_id.clone(),
            address: address.to_string(),
            status: JobStatus::Booked.as_str().to_string(),
            customer_id: customer_id.map(|c| c.to_string()),
            editor_of_record: None,
            delivered_at: None,
            cover_image: None,
            created_at: now.clone(),
            updated_at: now,
        };
        job_repo::insert(&self.db, &job)?;

        tracing::info!(job_id = %job.id, tenant_id = %job.tenant_id, "job booked");
        self.record_activity(principal, "job", &job.id, "created", None);
        Ok(job)
    }

    /// Schedules an appointment for a job and pushes it to the calendar sink
    /// best-effort. The external event id is persisted only when the sink
    /// succeeded; a sink failure leaves the appointment scheduled regardless.
    pub fn schedule_appointment(
        &self,
        principal: &Principal,
        job_id: &str,
        start_at: DateTime<Utc>,
        duration_minutes: u32,
        assigned_user: Option<&str>,
    ) -> Result<appointment_repo::AppointmentRow, WorkflowError> {
        self.require_staff(principal)?;
        let job = self.job_in_tenant(principal, job_id)?;
        if duration_minutes == 0 {
            return Err(WorkflowError::Validation {
                message: "duration must be positive".to_string(),
            });
        }

        let now = now_rfc3339();
        let mut appt = appointment_repo::AppointmentRow {
            id: Uuid::new_v4().to_string(),
            job_id: job.id.clone(),
            tenant_id: job.tenant_id.clone(),
            start_at: start_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            duration_minutes,
            assigned_user: assigned_user.map(|u| u.to_string()),
            status: AppointmentStatus::Scheduled.as_str().to_string(),
            calendar_event_id: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        appointment_repo::insert(&self.db, &appt)?;

        match self.calendar.create_event(&appt) {
            Ok(event_id) => {
                if let Err(e) =
                    appointment_repo::set_calendar_event(&self.db, &appt.id, &event_id, &now)
                {
                    tracing::warn!(appointment_id = %appt.id, error = %e,
                        "failed to persist calendar event id");
                } else {
                    appt.calendar_event_id = Some(event_id);
                }
            }
            Err(e) => {
                tracing::warn!(appointment_id = %appt.id, error = %e,
                    "calendar event creation failed");
            }
        }

        self.record_activity(principal, "appointment", &appt.id, "scheduled", None);
        self.notifications.send(
            Notification::new(
                NotificationKind::AppointmentScheduled,
                &job.tenant_id,
                crate::auth::Role::Customer,
            )
            .job(&job.id),
        );
        Ok(appt)
    }

    /// Moves an appointment to a new slot. The appointment must still be
    /// scheduled.
    pub fn reschedule_appointment(
        &self,
        principal: &Principal,
        appointment_id: &str,
        start_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<appointment_repo::AppointmentRow, WorkflowError> {
        self.require_staff(principal)?;
        let appt = self.appointment_in_tenant(principal, appointment_id)?;
        if appt.status != AppointmentStatus::Scheduled.as_str() {
            return Err(WorkflowError::Conflict {
                reason: format!("appointment is {}, not scheduled", appt.status),
            });
        }
        if duration_minutes == 0 {
            return Err(WorkflowError::Validation {
                message: "duration must be positive".to_string(),
            });
        }

        let now = now_rfc3339();
        let start = start_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        appointment_repo::reschedule(&self.db, &appt.id, &start, duration_minutes, &now)?;

        if let Some(event_id) = appt.calendar_event_id.as_deref() {
            let updated = appointment_repo::AppointmentRow {
                start_at: start.clone(),
                duration_minutes,
                ..appt.clone()
            };
            if let Err(e) = self.calendar.update_event(event_id, &updated) {
                tracing::warn!(appointment_id = %appt.id, error = %e,
                    "calendar event update failed");
            }
        }

        self.record_activity(principal, "appointment", &appt.id, "rescheduled", None);
        self.notifications.send(
            Notification::new(
                NotificationKind::AppointmentRescheduled,
                &appt.tenant_id,
                crate::auth::Role::Customer,
            )
            .job(&appt.job_id),
        );

        appointment_repo::find_by_id(&self.db, &appt.id)?.ok_or(WorkflowError::NotFound {
            entity: "appointment",
            id: appt.id.clone(),
        })
    }

    /// Cancels an appointment. The row stays (it may carry a calendar
    /// reference); only the status changes.
    pub fn cancel_appointment(
        &self,
        principal: &Principal,
        appointment_id: &str,
    ) -> Result<(), WorkflowError> {
        self.require_staff(principal)?;
        let appt = self.appointment_in_tenant(principal, appointment_id)?;

        let now = now_rfc3339();
        if !appointment_repo::cancel(&self.db, &appt.id, &now)? {
            return Err(WorkflowError::Conflict {
                reason: "appointment is not scheduled".to_string(),
            });
        }

        if let Some(event_id) = appt.calendar_event_id.as_deref() {
            if let Err(e) = self.calendar.delete_event(event_id) {
                tracing::warn!(appointment_id = %appt.id, error = %e,
                    "calendar event deletion failed");
            }
        }

        self.record_activity(principal, "appointment", &appt.id, "cancelled", None);
        self.notifications.send(
            Notification::new(
                NotificationKind::AppointmentCancelled,
                &appt.tenant_id,
                crate::auth::Role::Customer,
            )
            .job(&appt.job_id),
        );
        Ok(())
    }

    /// Creates a pending, unassigned order on a job, with its service line
    /// items.
    pub fn create_order(
        &self,
        principal: &Principal,
        job_id: &str,
        customer_id: Option<&str>,
        services: &[ServiceRequest],
    ) -> Result<order_repo::OrderRow, WorkflowError> {
        self.require_staff(principal)?;
        let job = self.job_in_tenant(principal, job_id)?;
        for service in services {
            if service.quantity == 0 {
                return Err(WorkflowError::Validation {
                    message: format!("service '{}' has zero quantity", service.service_ref),
                });
            }
        }

        let now = now_rfc3339();
        let order = order_repo::OrderRow {
            id: Uuid::new_v4().to_string(),
            tenant_id: job.tenant_id.clone(),
            order_number: generate_order_number(),
            job_id: job.id.clone(),
            customer_id: customer_id.map(|c| c.to_string()),
            assigned_editor: None,
            status: OrderStatus::Pending.as_str().to_string(),
            used_revision_rounds: 0,
            revision_notes: None,
            accepted_at: None,
            completed_at: None,
            approved_at: None,
            approved_by: None,
            version: 0,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        order_repo::insert(&self.db, &order)?;

        for service in services {
            let export_types = if service.export_types.is_empty() {
                None
            } else {
                serde_json::to_string(&service.export_types).ok()
            };
            order_service_repo::insert(
                &self.db,
                &order_service_repo::OrderServiceRow {
                    id: Uuid::new_v4().to_string(),
                    order_id: order.id.clone(),
                    service_ref: service.service_ref.clone(),
                    quantity: service.quantity,
                    instructions: service.instructions.clone(),
                    export_types,
                    created_at: now.clone(),
                },
            )?;
        }

        tracing::info!(order_id = %order.id, order_number = %order.order_number,
            job_id = %job.id, "order created");
        self.record_activity(principal, "order", &order.id, "created", None);
        Ok(order)
    }

    /// Editor accepts their assignment: `pending -> processing`. Also moves
    /// the job to `in_progress` on first acceptance and records the editor
    /// of record.
    pub fn accept_order(
        &self,
        principal: &Principal,
        order_id: &str,
    ) -> Result<order_repo::OrderRow, WorkflowError> {
        let order = self.order_by_id(order_id)?;
        self.require_assigned_editor(principal, &order)?;

        let now = now_rfc3339();
        if !order_repo::begin_processing(&self.db, &order.id, &principal.user_id, &now)? {
            return Err(WorkflowError::Conflict {
                reason: "order is not pending or assignment changed".to_string(),
            });
        }

        if let Some(job) = job_repo::find_by_id(&self.db, &order.job_id)? {
            if job.status == JobStatus::Booked.as_str() {
                job_repo::update_status(&self.db, &job.id, JobStatus::InProgress.as_str(), &now)?;
            }
            if job.editor_of_record.is_none() {
                job_repo::set_editor_of_record(&self.db, &job.id, &principal.user_id, &now)?;
            }
        }

        tracing::info!(order_id = %order.id, editor_id = %principal.user_id, "order accepted");
        self.record_activity(principal, "order", &order.id, "accepted", None);
        self.notifications.send(
            Notification::new(
                NotificationKind::OrderAccepted,
                &order.tenant_id,
                crate::auth::Role::TenantAdmin,
            )
            .order(&order.id)
            .job(&order.job_id),
        );

        self.order_by_id(order_id)
    }

    /// Editor declines their assignment: `pending -> cancelled`, clearing
    /// the assignment so the order re-enters the assignable pool once
    /// reopened by staff.
    pub fn decline_order(
        &self,
        principal: &Principal,
        order_id: &str,
    ) -> Result<(), WorkflowError> {
        let order = self.order_by_id(order_id)?;
        self.require_assigned_editor(principal, &order)?;

        let now = now_rfc3339();
        if !order_repo::decline(&self.db, &order.id, &principal.user_id, &now)? {
            return Err(WorkflowError::Conflict {
                reason: "order is not pending or assignment changed".to_string(),
            });
        }

        tracing::info!(order_id = %order.id, editor_id = %principal.user_id, "order declined");
        self.record_activity(principal, "order", &order.id, "declined", None);
        self.notifications.send(
            Notification::new(
                NotificationKind::OrderDeclined,
                &order.tenant_id,
                crate::auth::Role::TenantAdmin,
            )
            .order(&order.id)
            .job(&order.job_id),
        );
        Ok(())
    }

    /// Editor submits finished work: `processing|in_revision -> human_check`.
    pub fn submit_for_review(
        &self,
        principal: &Principal,
        order_id: &str,
    ) -> Result<order_repo::OrderRow, WorkflowError> {
        let order = self.order_by_id(order_id)?;
        self.require_assigned_editor(principal, &order)?;

        let now = now_rfc3339();
        if !order_repo::submit_for_review(&self.db, &order.id, &principal.user_id, &now)? {
            return Err(WorkflowError::Conflict {
                reason: format!("order is {}, cannot submit for review", order.status),
            });
        }

        tracing::info!(order_id = %order.id, "order submitted for review");
        self.record_activity(principal, "order", &order.id, "submitted", None);
        self.notifications.send(
            Notification::new(
                NotificationKind::OrderSubmitted,
                &order.tenant_id,
                crate::auth::Role::TenantAdmin,
            )
            .order(&order.id)
            .job(&order.job_id),
        );

        self.order_by_id(order_id)
    }

    /// Delivers a job to the customer: marks the job delivered and
    /// bulk-forces every non-cancelled order of the job to `delivered`,
    /// regardless of where it stood. Returns the number of cascaded orders.
    pub fn deliver_job(
        &self,
        principal: &Principal,
        job_id: &str,
    ) -> Result<usize, WorkflowError> {
        self.require_staff(principal)?;
        let job = self.job_in_tenant(principal, job_id)?;

        let now = now_rfc3339();
        if !job_repo::mark_delivered(&self.db, &job.id, &now)? {
            return Err(WorkflowError::Conflict {
                reason: format!("job is {}, cannot deliver", job.status),
            });
        }
        let cascaded = order_repo::deliver_all_for_job(&self.db, &job.id, &now)?;

        tracing::info!(job_id = %job.id, cascaded, "job delivered");
        self.record_activity(
            principal,
            "job",
            &job.id,
            "delivered",
            Some(format!("{} orders cascaded", cascaded)),
        );
        self.notifications.send(
            Notification::new(
                NotificationKind::JobDelivered,
                &job.tenant_id,
                crate::auth::Role::Customer,
            )
            .job(&job.id),
        );
        Ok(cascaded)
    }

    /// Picks a deliverable of the job as its cover image.
    pub fn set_cover_image(
        &self,
        principal: &Principal,
        job_id: &str,
        deliverable_id: &str,
    ) -> Result<(), WorkflowError> {
        self.require_staff(principal)?;
        let job = self.job_in_tenant(principal, job_id)?;

        let deliverable = deliverable_repo::find_by_id(&self.db, deliverable_id)?.ok_or(
            WorkflowError::NotFound {
                entity: "deliverable",
                id: deliverable_id.to_string(),
            },
        )?;
        if deliverable.job_id != job.id {
            return Err(WorkflowError::Validation {
                message: "deliverable does not belong to this job".to_string(),
            });
        }

        job_repo::set_cover_image(&self.db, &job.id, &deliverable.id, &now_rfc3339())?;
        self.record_activity(principal, "job", &job.id, "cover_image_set", None);
        Ok(())
    }

    /// Customer submits a review of a delivered job. At most one per job; a
    /// second submission is a conflict.
    pub fn submit_job_review(
        &self,
        principal: &Principal,
        job_id: &str,
        rating: u32,
        body: Option<&str>,
    ) -> Result<review_repo::ReviewRow, WorkflowError> {
        let job = self.job_in_tenant(principal, job_id)?;
        if !(1..=5).contains(&rating) {
            return Err(WorkflowError::Validation {
                message: "rating must be between 1 and 5".to_string(),
            });
        }
        if review_repo::find_by_job(&self.db, &job.id)?.is_some() {
            return Err(WorkflowError::Conflict {
                reason: "job already has a review".to_string(),
            });
        }

        let review = review_repo::ReviewRow {
            id: Uuid::new_v4().to_string(),
            job_id: job.id.clone(),
            rating,
            body: body.map(|b| b.to_string()),
            created_at: now_rfc3339(),
        };
        review_repo::insert(&self.db, &review)?;

        self.record_activity(principal, "job", &job.id, "reviewed", None);
        Ok(review)
    }

    // Guard helpers shared by the submodules.

    fn require_staff(&self, principal: &Principal) -> Result<(), WorkflowError> {
        if principal.role.is_tenant_staff() {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden {
                reason: format!("role {} is not tenant staff", principal.role),
            })
        }
    }

    fn require_assigned_editor(
        &self,
        principal: &Principal,
        order: &order_repo::OrderRow,
    ) -> Result<(), WorkflowError> {
        if order.assigned_editor.as_deref() == Some(principal.user_id.as_str()) {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden {
                reason: "order is not assigned to this editor".to_string(),
            })
        }
    }

    fn order_by_id(&self, order_id: &str) -> Result<order_repo::OrderRow, WorkflowError> {
        order_repo::find_by_id(&self.db, order_id)?.ok_or(WorkflowError::NotFound {
            entity: "order",
            id: order_id.to_string(),
        })
    }

    fn job_in_tenant(
        &self,
        principal: &Principal,
        job_id: &str,
    ) -> Result<job_repo::JobRow, WorkflowError> {
        let job = job_repo::find_by_id(&self.db, job_id)?.ok_or(WorkflowError::NotFound {
            entity: "job",
            id: job_id.to_string(),
        })?;
        if job.tenant_id != principal.tenant_id {
            return Err(WorkflowError::Forbidden {
                reason: "job belongs to another tenant".to_string(),
            });
        }
        Ok(job)
    }

    fn appointment_in_tenant(
        &self,
        principal: &Principal,
        appointment_id: &str,
    ) -> Result<appointment_repo::AppointmentRow, WorkflowError> {
        let appt = appointment_repo::find_by_id(&self.db, appointment_id)?.ok_or(
            WorkflowError::NotFound {
                entity: "appointment",
                id: appointment_id.to_string(),
            },
        )?;
        if appt.tenant_id != principal.tenant_id {
            return Err(WorkflowError::Forbidden {
                reason: "appointment belongs to another tenant".to_string(),
            });
        }
        Ok(appt)
    }

    /// Appends to the activity log best-effort. A logging failure must never
    /// fail the transition that triggered it.
    fn record_activity(
        &self,
        principal: &Principal,
        entity_kind: &str,
        entity_id: &str,
        action: &str,
        detail: Option<String>,
    ) {
        let record = activity_repo::ActivityRow {
            id: Uuid::new_v4().to_string(),
            tenant_id: principal.tenant_id.clone(),
            entity_kind: entity_kind.to_string(),
            entity_id: entity_id.to_string(),
            actor_id: principal.user_id.clone(),
            action: action.to_string(),
            detail,
            created_at: now_rfc3339(),
        };
        if let Err(e) = activity_repo::append(&self.db, &record) {
            tracing::warn!(entity_kind, entity_id, action, error = %e,
                "failed to append activity record");
        }
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Human-readable order number: `ORD-YYYYMMDD-XXXXXX`. Uniqueness within a
/// tenant is enforced by the database; the random suffix makes collisions
/// practically impossible.
fn generate_order_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}
