//! Notification broadcaster for workflow events.
//!
//! Publishing is fire-and-forget over a `tokio::sync::broadcast` channel;
//! the delivery layer (email, push, in-app) subscribes out-of-band.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::auth::Role;

/// What happened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderAssigned,
    OrderAccepted,
    OrderDeclined,
    OrderSubmitted,
    OrderCompleted,
    OrderRejected,
    RevisionRequested,
    JobDelivered,
    AppointmentScheduled,
    AppointmentRescheduled,
    AppointmentCancelled,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::OrderAssigned => write!(f, "Order assigned"),
            NotificationKind::OrderAccepted => write!(f, "Order accepted"),
            NotificationKind::OrderDeclined => write!(f, "Order declined"),
            NotificationKind::OrderSubmitted => write!(f, "Order submitted for review"),
            NotificationKind::OrderCompleted => write!(f, "Order completed"),
            NotificationKind::OrderRejected => write!(f, "Order sent back for revision"),
            NotificationKind::RevisionRequested => write!(f, "Revision requested"),
            NotificationKind::JobDelivered => write!(f, "Job delivered"),
            NotificationKind::AppointmentScheduled => write!(f, "Appointment scheduled"),
            NotificationKind::AppointmentRescheduled => write!(f, "Appointment rescheduled"),
            NotificationKind::AppointmentCancelled => write!(f, "Appointment cancelled"),
        }
    }
}

/// A workflow notification addressed to the counterpart role of a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub tenant_id: String,
    /// Specific recipient, when known. None means "the tenant's staff".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub recipient_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, tenant_id: &str, recipient_role: Role) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            tenant_id: tenant_id.to_string(),
            recipient: None,
            recipient_role,
            job_id: None,
            order_id: None,
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn recipient(mut self, user_id: &str) -> Self {
        self.recipient = Some(user_id.to_string());
        self
    }

    pub fn job(mut self, job_id: &str) -> Self {
        self.job_id = Some(job_id.to_string());
        self
    }

    pub fn order(mut self, order_id: &str) -> Self {
        self.order_id = Some(order_id.to_string());
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }
}

/// Broadcasts workflow notifications to all subscribers.
#[derive(Clone)]
pub struct NotificationBroadcaster {
    sender: Arc<broadcast::Sender<Notification>>,
}

impl NotificationBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publishes a notification to all subscribers.
    pub fn send(&self, notification: Notification) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(notification);
    }

    /// Creates a new subscriber for notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_receivers_is_fine() {
        let broadcaster = NotificationBroadcaster::new(10);
        broadcaster.send(Notification::new(
            NotificationKind::OrderAssigned,
            "t1",
            Role::Editor,
        ));
    }

    #[test]
    fn test_send_receive() {
        let broadcaster = NotificationBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(
            Notification::new(NotificationKind::OrderAssigned, "t1", Role::Editor)
                .recipient("e1")
                .order("o1")
                .job("j1"),
        );

        let received = rx.try_recv().unwrap();
        assert_eq!(received.kind, NotificationKind::OrderAssigned);
        assert_eq!(received.recipient.as_deref(), Some("e1"));
        assert_eq!(received.order_id.as_deref(), Some("o1"));
        assert_eq!(received.recipient_role, Role::Editor);
    }

    #[test]
    fn test_custom_message() {
        let broadcaster = NotificationBroadcaster::default();
        let mut rx = broadcaster.subscribe();

        broadcaster.send(
            Notification::new(NotificationKind::OrderRejected, "t1", Role::Editor)
                .message("QC rejected: fix the horizon"),
        );

        let received = rx.try_recv().unwrap();
        assert_eq!(received.message, "QC rejected: fix the horizon");
    }
}
