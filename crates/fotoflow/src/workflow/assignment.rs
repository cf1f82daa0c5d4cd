//! Assignment coordinator — atomic editor assignment.
//!
//! Assignment is a compare-and-swap on the order's `version` counter: the
//! caller reads the order, checks the guards, and the write succeeds only if
//! no concurrent mutation bumped the version in between. A lost race is a
//! `Conflict`, distinct from `NotFound` and `Forbidden`.

use crate::auth::Principal;
use crate::broadcast::{Notification, NotificationKind};
use crate::db::{order_repo, tenant_repo};
use crate::error::WorkflowError;
use crate::workflow::status::OrderStatus;

use super::{now_rfc3339, WorkflowService};

impl WorkflowService {
    /// Assigns a pending, unassigned order to an editor with an active
    /// membership in the order's tenant. Exactly one of two concurrent
    /// calls wins; the loser gets `Conflict`.
    pub fn assign_order(
        &self,
        principal: &Principal,
        order_id: &str,
        editor_id: &str,
    ) -> Result<order_repo::OrderRow, WorkflowError> {
        self.require_staff(principal)?;
        let order = self.order_by_id(order_id)?;
        if order.tenant_id != principal.tenant_id {
            return Err(WorkflowError::Forbidden {
                reason: "order belongs to another tenant".to_string(),
            });
        }

        let membership = tenant_repo::find_membership(self.database(), editor_id, &order.tenant_id)?;
        match membership {
            Some(m) if m.is_active() => {}
            _ => {
                return Err(WorkflowError::Forbidden {
                    reason: format!(
                        "editor {} has no active membership with this tenant",
                        editor_id
                    ),
                })
            }
        }

        if order.status != OrderStatus::Pending.as_str() {
            return Err(WorkflowError::Conflict {
                reason: format!("order is {}, not pending", order.status),
            });
        }
        if order.assigned_editor.is_some() {
            return Err(WorkflowError::Conflict {
                reason: "order is already assigned".to_string(),
            });
        }

        let now = now_rfc3339();
        if !order_repo::assign_editor(self.database(), &order.id, editor_id, order.version, &now)? {
            // Someone else mutated the order between our read and the write.
            return Err(WorkflowError::Conflict {
                reason: "order was assigned concurrently".to_string(),
            });
        }

        tracing::info!(order_id = %order.id, editor_id, "order assigned");
        self.record_activity(
            principal,
            "order",
            &order.id,
            "assigned",
            Some(editor_id.to_string()),
        );
        self.notifications.send(
            Notification::new(
                NotificationKind::OrderAssigned,
                &order.tenant_id,
                crate::auth::Role::Editor,
            )
            .recipient(editor_id)
            .order(&order.id)
            .job(&order.job_id),
        );

        self.order_by_id(order_id)
    }

    /// The assignable pool: pending, unassigned orders of the tenant.
    pub fn list_assignable_orders(
        &self,
        principal: &Principal,
    ) -> Result<Vec<order_repo::OrderRow>, WorkflowError> {
        self.require_staff(principal)?;
        Ok(order_repo::list_assignable(
            self.database(),
            &principal.tenant_id,
        )?)
    }
}
