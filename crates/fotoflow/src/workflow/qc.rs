//! QC gate — every order passes human review before reaching the customer.
//!
//! Both decisions require the order to be in `human_check` and may be taken
//! by the assigned editor or by tenant staff of the order's tenant. Accept
//! never touches the revision-round counter; reject consumes one round.

use crate::auth::Principal;
use crate::broadcast::{Notification, NotificationKind};
use crate::db::order_repo;
use crate::error::WorkflowError;

use super::{now_rfc3339, WorkflowService};

impl WorkflowService {
    /// Approves the submitted work: `human_check -> completed`. Records who
    /// approved and when.
    pub fn qc_accept(
        &self,
        principal: &Principal,
        order_id: &str,
    ) -> Result<order_repo::OrderRow, WorkflowError> {
        let order = self.order_by_id(order_id)?;
        self.require_qc_approver(principal, &order)?;

        let now = now_rfc3339();
        if !order_repo::accept_qc(self.database(), &order.id, &principal.user_id, &now)? {
            return Err(WorkflowError::Conflict {
                reason: format!("order is {}, not human_check", order.status),
            });
        }

        tracing::info!(order_id = %order.id, approver = %principal.user_id, "qc accepted");
        self.record_activity(principal, "order", &order.id, "qc_accepted", None);
        let mut notification = Notification::new(
            NotificationKind::OrderCompleted,
            &order.tenant_id,
            crate::auth::Role::Editor,
        )
        .order(&order.id)
        .job(&order.job_id);
        if let Some(editor) = order.assigned_editor.as_deref() {
            notification = notification.recipient(editor);
        }
        self.notifications.send(notification);

        self.order_by_id(order_id)
    }

    /// Rejects the submitted work: `human_check -> in_revision`, storing the
    /// reviewer's notes and consuming one revision round. Notes are required.
    pub fn qc_reject(
        &self,
        principal: &Principal,
        order_id: &str,
        notes: &str,
    ) -> Result<order_repo::OrderRow, WorkflowError> {
        if notes.trim().is_empty() {
            return Err(WorkflowError::Validation {
                message: "rejection notes must not be empty".to_string(),
            });
        }
        let order = self.order_by_id(order_id)?;
        self.require_qc_approver(principal, &order)?;

        let now = now_rfc3339();
        if !order_repo::reject_qc(self.database(), &order.id, notes, &now)? {
            return Err(WorkflowError::Conflict {
                reason: format!("order is {}, not human_check", order.status),
            });
        }

        tracing::info!(order_id = %order.id, reviewer = %principal.user_id, "qc rejected");
        self.record_activity(
            principal,
            "order",
            &order.id,
            "qc_rejected",
            Some(notes.to_string()),
        );
        let mut notification = Notification::new(
            NotificationKind::OrderRejected,
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

    /// The QC gate's dual-role access: the assigned editor self-checks, or
    /// tenant staff of the order's tenant reviews.
    fn require_qc_approver(
        &self,
        principal: &Principal,
        order: &order_repo::OrderRow,
    ) -> Result<(), WorkflowError> {
        if order.assigned_editor.as_deref() == Some(principal.user_id.as_str()) {
            return Ok(());
        }
        if principal.role.is_tenant_staff() && principal.tenant_id == order.tenant_id {
            return Ok(());
        }
        Err(WorkflowError::Forbidden {
            reason: "only the assigned editor or tenant staff may review".to_string(),
        })
    }
}
