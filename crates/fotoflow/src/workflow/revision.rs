//! Revision policy engine.
//!
//! Computes whether a new revision round is permitted for an order. Pure:
//! evaluation never mutates state. Precedence, in strict order:
//!
//! 1. Job not yet delivered — unlimited (pre-delivery iteration is free).
//! 2. Customer override "unlimited" — allowed unconditionally.
//! 3. Customer numeric override — compare used rounds against it.
//! 4. Tenant limiting enabled — compare against the tenant's round limit.
//! 5. Otherwise — unlimited.
//!
//! Customer override beats tenant default beats no-limit. Getting this
//! order wrong silently changes billing-relevant behavior.

use crate::auth::{Principal, Role};
use crate::broadcast::{Notification, NotificationKind};
use crate::db::order_repo::{self, OrderRow};
use crate::db::tenant_repo::{self, CustomerRow, RevisionOverride, TenantRow};
use crate::db::job_repo;
use crate::error::WorkflowError;
use crate::workflow::status::JobStatus;

use super::{now_rfc3339, WorkflowService};

/// Effective round budget for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundLimit {
    Unlimited,
    Limited(u32),
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionDecision {
    pub allowed: bool,
    pub max_rounds: RoundLimit,
    pub used_rounds: u32,
}

impl RevisionDecision {
    /// Rounds still available; `None` means unlimited.
    pub fn remaining_rounds(&self) -> Option<u32> {
        match self.max_rounds {
            RoundLimit::Unlimited => None,
            RoundLimit::Limited(max) => Some(max.saturating_sub(self.used_rounds)),
        }
    }
}

/// Evaluates the revision policy for one order.
///
/// `customer` is the customer on the order, when one is linked; `tenant`
/// supplies the fallback default.
pub fn evaluate(
    order: &OrderRow,
    job_status: JobStatus,
    customer: Option<&CustomerRow>,
    tenant: &TenantRow,
) -> RevisionDecision {
    let used_rounds = order.used_revision_rounds;

    // 1. Pre-delivery iteration is unconstrained.
    if !job_status.is_delivered() {
        return RevisionDecision {
            allowed: true,
            max_rounds: RoundLimit::Unlimited,
            used_rounds,
        };
    }

    // 2 & 3. Customer override beats the tenant default.
    if let Some(override_) = customer.and_then(|c| c.parsed_override()) {
        return match override_ {
            RevisionOverride::Unlimited => RevisionDecision {
                allowed: true,
                max_rounds: RoundLimit::Unlimited,
                used_rounds,
            },
            RevisionOverride::Limit(max) => RevisionDecision {
                allowed: used_rounds < max,
                max_rounds: RoundLimit::Limited(max),
                used_rounds,
            },
        };
    }

    // 4. Tenant default, when limiting is enabled.
    if tenant.revision_limit_enabled {
        let max = tenant.revision_round_limit;
        return RevisionDecision {
            allowed: used_rounds < max,
            max_rounds: RoundLimit::Limited(max),
            used_rounds,
        };
    }

    // 5. No limit configured anywhere.
    RevisionDecision {
        allowed: true,
        max_rounds: RoundLimit::Unlimited,
        used_rounds,
    }
}

impl WorkflowService {
    /// Customer requests another revision round on a completed or delivered
    /// order. The policy is evaluated first; a denial returns
    /// `RevisionLimit` without mutating anything. When allowed, the
    /// transition to `in_revision` stores the notes and consumes one round
    /// in a single conditional update.
    pub fn request_revision(
        &self,
        principal: &Principal,
        order_id: &str,
        notes: &str,
    ) -> Result<OrderRow, WorkflowError> {
        if notes.trim().is_empty() {
            return Err(WorkflowError::Validation {
                message: "revision notes must not be empty".to_string(),
            });
        }
        // Customer-initiated by definition; internal rework goes through
        // the QC reject path, which attributes the round to the reviewer.
        if principal.role != Role::Customer {
            return Err(WorkflowError::Forbidden {
                reason: "only the customer requests revisions".to_string(),
            });
        }
        let order = self.order_by_id(order_id)?;
        if order.tenant_id != principal.tenant_id {
            return Err(WorkflowError::Forbidden {
                reason: "order belongs to another tenant".to_string(),
            });
        }

        let job = job_repo::find_by_id(self.database(), &order.job_id)?.ok_or(
            WorkflowError::NotFound {
                entity: "job",
                id: order.job_id.clone(),
            },
        )?;
        let job_status =
            JobStatus::parse(&job.status).ok_or_else(|| WorkflowError::Validation {
                message: format!("unknown job status '{}'", job.status),
            })?;
        let tenant = tenant_repo::find_tenant(self.database(), &order.tenant_id)?.ok_or(
            WorkflowError::NotFound {
                entity: "tenant",
                id: order.tenant_id.clone(),
            },
        )?;
        let customer = match order.customer_id.as_deref() {
            Some(id) => tenant_repo::find_customer(self.database(), id)?,
            None => None,
        };

        let decision = evaluate(&order, job_status, customer.as_ref(), &tenant);
        if !decision.allowed {
            let max_rounds = match decision.max_rounds {
                RoundLimit::Limited(max) => max,
                RoundLimit::Unlimited => decision.used_rounds,
            };
            return Err(WorkflowError::RevisionLimit {
                used_rounds: decision.used_rounds,
                max_rounds,
            });
        }

        let now = now_rfc3339();
        if !order_repo::request_revision(self.database(), &order.id, notes, &now)? {
            return Err(WorkflowError::Conflict {
                reason: format!("order is {}, cannot take a revision", order.status),
            });
        }

        tracing::info!(order_id = %order.id, round = decision.used_rounds + 1,
            "revision requested");
        self.record_activity(
            principal,
            "order",
            &order.id,
            "revision_requested",
            Some(notes.to_string()),
        );
        let mut notification = Notification::new(
            NotificationKind::RevisionRequested,
            &order.tenant_id,
            crate::auth::Role::Editor,
        )
        .order(&order.id)
        .job(&order.job_id)
        .message(notes);
        if let Some(editor) = order.assigned_editor.as_deref() {
            notification = notification.recipient(editor);
        }
        self.notifications.send(notification);

        self.order_by_id(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with_rounds(used: u32) -> OrderRow {
        OrderRow {
            id: "o1".to_string(),
            tenant_id: "t1".to_string(),
            order_number: "ORD-1".to_string(),
            job_id: "j1".to_string(),
            customer_id: Some("c1".to_string()),
            assigned_editor: Some("e1".to_string()),
            status: "delivered".to_string(),
            used_revision_rounds: used,
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

    fn tenant(limit_enabled: bool, limit: u32) -> TenantRow {
        TenantRow {
            id: "t1".to_string(),
            name: "Studio".to_string(),
            revision_limit_enabled: limit_enabled,
            revision_round_limit: limit,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn customer(override_: Option<&str>) -> CustomerRow {
        CustomerRow {
            id: "c1".to_string(),
            tenant_id: "t1".to_string(),
            name: "Acme".to_string(),
            revision_override: override_.map(|s| s.to_string()),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_pre_delivery_is_unlimited() {
        // Even with a huge count and a strict tenant limit.
        let decision = evaluate(
            &order_with_rounds(100),
            JobStatus::Booked,
            Some(&customer(None)),
            &tenant(true, 2),
        );
        assert!(decision.allowed);
        assert_eq!(decision.max_rounds, RoundLimit::Unlimited);
        assert_eq!(decision.remaining_rounds(), None);
    }

    #[test]
    fn test_unlimited_override_beats_tenant_limit() {
        let decision = evaluate(
            &order_with_rounds(5),
            JobStatus::Delivered,
            Some(&customer(Some("unlimited"))),
            &tenant(true, 2),
        );
        assert!(decision.allowed);
        assert_eq!(decision.max_rounds, RoundLimit::Unlimited);
    }

    #[test]
    fn test_numeric_override_beats_tenant_limit() {
        // Tenant would deny at 2, but the customer carries 5.
        let decision = evaluate(
            &order_with_rounds(3),
            JobStatus::Delivered,
            Some(&customer(Some("5"))),
            &tenant(true, 2),
        );
        assert!(decision.allowed);
        assert_eq!(decision.max_rounds, RoundLimit::Limited(5));
        assert_eq!(decision.remaining_rounds(), Some(2));

        let decision = evaluate(
            &order_with_rounds(5),
            JobStatus::Delivered,
            Some(&customer(Some("5"))),
            &tenant(true, 2),
        );
        assert!(!decision.allowed);
        assert_eq!(decision.remaining_rounds(), Some(0));
    }

    #[test]
    fn test_tenant_default_applies_without_override() {
        let decision = evaluate(
            &order_with_rounds(2),
            JobStatus::Delivered,
            Some(&customer(None)),
            &tenant(true, 2),
        );
        assert!(!decision.allowed);
        assert_eq!(decision.max_rounds, RoundLimit::Limited(2));
        assert_eq!(decision.remaining_rounds(), Some(0));

        let decision = evaluate(
            &order_with_rounds(1),
            JobStatus::Delivered,
            Some(&customer(None)),
            &tenant(true, 2),
        );
        assert!(decision.allowed);
        assert_eq!(decision.remaining_rounds(), Some(1));
    }

    #[test]
    fn test_no_tenant_limit_means_unlimited() {
        let decision = evaluate(
            &order_with_rounds(50),
            JobStatus::Delivered,
            None,
            &tenant(false, 2),
        );
        assert!(decision.allowed);
        assert_eq!(decision.max_rounds, RoundLimit::Unlimited);
    }

    #[test]
    fn test_missing_customer_uses_tenant_default() {
        let decision = evaluate(
            &order_with_rounds(2),
            JobStatus::Delivered,
            None,
            &tenant(true, 2),
        );
        assert!(!decision.allowed);
    }

    #[test]
    fn test_evaluation_does_not_mutate() {
        let order = order_with_rounds(2);
        let _ = evaluate(
            &order,
            JobStatus::Delivered,
            Some(&customer(None)),
            &tenant(true, 2),
        );
        assert_eq!(order.used_revision_rounds, 2);
    }

    // Service-level request_revision tests.

    use std::sync::Arc;

    use crate::auth::Role;
    use crate::broadcast::{NoopCalendarSink, NotificationBroadcaster};
    use crate::db::Database;
    use crate::workflow::ServiceRequest;

    /// A tenant with a 2-round limit, one customer, and an order driven to
    /// `completed`.
    fn harness(customer_override: Option<&str>) -> (WorkflowService, Principal, String, String) {
        let db = Database::open_in_memory().expect("Failed to create test database");
        tenant_repo::insert_tenant(
            &db,
            &tenant(true, 2),
        )
        .unwrap();
        tenant_repo::insert_customer(&db, &customer(customer_override)).unwrap();
        tenant_repo::insert_membership(
            &db,
            &tenant_repo::MembershipRow {
                editor_id: "e1".to_string(),
                tenant_id: "t1".to_string(),
                status: "active".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();

        let svc = WorkflowService::new(
            db,
            NotificationBroadcaster::default(),
            Arc::new(NoopCalendarSink),
        );
        let staff = Principal::new("owner1", Role::TenantOwner, "t1");
        let editor = Principal::new("e1", Role::Editor, "t1");
        let job = svc.create_job(&staff, "12 Harbor Lane", Some("c1")).unwrap();
        let order = svc
            .create_order(
                &staff,
                &job.id,
                Some("c1"),
                &[ServiceRequest {
                    service_ref: "photo-editing".to_string(),
                    quantity: 10,
                    instructions: None,
                    export_types: vec![],
                }],
            )
            .unwrap();
        svc.assign_order(&staff, &order.id, "e1").unwrap();
        svc.accept_order(&editor, &order.id).unwrap();
        svc.submit_for_review(&editor, &order.id).unwrap();
        svc.qc_accept(&staff, &order.id).unwrap();
        (svc, staff, job.id.clone(), order.id.clone())
    }

    fn cust() -> Principal {
        Principal::new("cust1", Role::Customer, "t1")
    }

    #[test]
    fn test_request_revision_requires_notes() {
        let (svc, _, _, order_id) = harness(None);
        let err = svc.request_revision(&cust(), &order_id, "").unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[test]
    fn test_only_customers_request_revisions() {
        let (svc, staff, _, order_id) = harness(None);
        let editor = Principal::new("e1", Role::Editor, "t1");

        let err = svc.request_revision(&staff, &order_id, "tweak").unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden { .. }));
        let err = svc.request_revision(&editor, &order_id, "tweak").unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden { .. }));

        // The refused requests consumed nothing.
        let order = order_repo::find_by_id(svc.database(), &order_id)
            .unwrap()
            .unwrap();
        assert_eq!(order.status, "completed");
        assert_eq!(order.used_revision_rounds, 0);
    }

    #[test]
    fn test_pre_delivery_revisions_do_not_hit_tenant_limit() {
        let (svc, _, _, order_id) = harness(None);
        let editor = Principal::new("e1", Role::Editor, "t1");

        // Three rounds before delivery, limit of two: all fine.
        for round in 1..=3u32 {
            let order = svc
                .request_revision(&cust(), &order_id, "more tweaks")
                .unwrap();
            assert_eq!(order.used_revision_rounds, round);
            svc.submit_for_review(&editor, &order_id).unwrap();
            svc.qc_accept(&Principal::new("owner1", Role::TenantOwner, "t1"), &order_id)
                .unwrap();
        }
    }

    #[test]
    fn test_post_delivery_denial_does_not_mutate() {
        let (svc, staff, job_id, order_id) = harness(None);
        svc.deliver_job(&staff, &job_id).unwrap();
        let editor = Principal::new("e1", Role::Editor, "t1");

        // Use up the two tenant rounds.
        for _ in 0..2 {
            svc.request_revision(&cust(), &order_id, "tweak").unwrap();
            svc.submit_for_review(&editor, &order_id).unwrap();
            svc.qc_accept(&staff, &order_id).unwrap();
            order_repo::mark_delivered(svc.database(), &order_id, "2026-01-05T00:00:00Z").unwrap();
        }

        let err = svc.request_revision(&cust(), &order_id, "one more").unwrap_err();
        match err {
            WorkflowError::RevisionLimit {
                used_rounds,
                max_rounds,
            } => {
                assert_eq!(used_rounds, 2);
                assert_eq!(max_rounds, 2);
            }
            other => panic!("expected RevisionLimit, got {:?}", other),
        }

        // Denied request left the order untouched.
        let order = order_repo::find_by_id(svc.database(), &order_id)
            .unwrap()
            .unwrap();
        assert_eq!(order.status, "delivered");
        assert_eq!(order.used_revision_rounds, 2);
        assert_eq!(order.revision_notes.as_deref(), Some("tweak"));
    }

    #[test]
    fn test_unlimited_override_survives_delivery() {
        let (svc, staff, job_id, order_id) = harness(Some("unlimited"));
        svc.deliver_job(&staff, &job_id).unwrap();
        let editor = Principal::new("e1", Role::Editor, "t1");

        for round in 1..=4u32 {
            let order = svc.request_revision(&cust(), &order_id, "again").unwrap();
            assert_eq!(order.used_revision_rounds, round);
            assert_eq!(order.status, "in_revision");
            svc.submit_for_review(&editor, &order_id).unwrap();
            svc.qc_accept(&staff, &order_id).unwrap();
            order_repo::mark_delivered(svc.database(), &order_id, "2026-01-05T00:00:00Z").unwrap();
        }
    }

    #[test]
    fn test_request_revision_notifies_editor_with_notes() {
        let (svc, _, _, order_id) = harness(None);
        let mut rx = svc.notifications.subscribe();

        svc.request_revision(&cust(), &order_id, "warmer tones please")
            .unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, NotificationKind::RevisionRequested);
        assert_eq!(event.recipient.as_deref(), Some("e1"));
        assert_eq!(event.message, "warmer tones please");
    }
}
