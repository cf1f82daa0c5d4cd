//! Canonical status enums for jobs, orders and appointments.
//!
//! Order transitions:
//! `pending -> processing -> human_check -> {completed | in_revision}`,
//! `in_revision -> human_check` (resubmit), `completed -> delivered`,
//! `pending -> cancelled` (decline). `delivered` and `cancelled` are
//! terminal. The job-delivered cascade bypasses this table deliberately.

use serde::{Deserialize, Serialize};

/// Status of an order through the editing workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    HumanCheck,
    InRevision,
    Completed,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::HumanCheck => "human_check",
            OrderStatus::InRevision => "in_revision",
            OrderStatus::Completed => "completed",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "human_check" => Some(OrderStatus::HumanCheck),
            "in_revision" => Some(OrderStatus::InRevision),
            "completed" => Some(OrderStatus::Completed),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether the normal state machine allows `self -> next`. The
    /// job-delivered cascade is the one sanctioned exception and does not
    /// consult this.
    pub fn can_transition(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, HumanCheck)
                | (InRevision, HumanCheck)
                | (HumanCheck, Completed)
                | (HumanCheck, InRevision)
                | (Completed, InRevision)
                | (Completed, Delivered)
                | (Delivered, InRevision)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a job from booking to delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Booked,
    InProgress,
    Delivered,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Booked => "booked",
            JobStatus::InProgress => "in_progress",
            JobStatus::Delivered => "delivered",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "booked" => Some(JobStatus::Booked),
            "in_progress" => Some(JobStatus::InProgress),
            "delivered" => Some(JobStatus::Delivered),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, JobStatus::Delivered)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an uploaded deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    /// Client-supplied input awaiting editing.
    ForEditing,
    /// Editor output awaiting (or past) QC.
    Completed,
}

impl DeliverableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliverableStatus::ForEditing => "for_editing",
            DeliverableStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "for_editing" => Some(DeliverableStatus::ForEditing),
            "completed" => Some(DeliverableStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliverableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
