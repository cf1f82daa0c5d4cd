//! Calendar sink — best-effort sync of appointments to an external calendar.

use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

use crate::db::appointment_repo::AppointmentRow;

/// Failure of a best-effort side effect. Callers log this and move on; it
/// never converts into a workflow error.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct SideEffectError(pub String);

/// One-way calendar integration seam.
pub trait CalendarSink: Send + Sync {
    /// Creates an event for the appointment, returning the external event id.
    fn create_event(&self, appointment: &AppointmentRow) -> Result<String, SideEffectError>;

    /// Updates the event after a reschedule.
    fn update_event(
        &self,
        event_id: &str,
        appointment: &AppointmentRow,
    ) -> Result<(), SideEffectError>;

    /// Deletes the event after a cancellation.
    fn delete_event(&self, event_id: &str) -> Result<(), SideEffectError>;
}

/// Sink for deployments without calendar integration. Hands out synthetic
/// event ids so the rest of the flow behaves the same.
pub struct NoopCalendarSink;

impl CalendarSink for NoopCalendarSink {
    fn create_event(&self, _appointment: &AppointmentRow) -> Result<String, SideEffectError> {
        Ok(format!("noop-{}", Uuid::new_v4().simple()))
    }

    fn update_event(
        &self,
        _event_id: &str,
        _appointment: &AppointmentRow,
    ) -> Result<(), SideEffectError> {
        Ok(())
    }

    fn delete_event(&self, _event_id: &str) -> Result<(), SideEffectError> {
        Ok(())
    }
}

/// A recorded calendar call, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCall {
    Created { appointment_id: String },
    Updated { event_id: String },
    Deleted { event_id: String },
}

/// Test sink that records calls and can be told to fail, to verify that
/// calendar failures never affect the primary write.
#[derive(Default)]
pub struct RecordingCalendarSink {
    calls: Mutex<Vec<CalendarCall>>,
    fail: Mutex<bool>,
}

impl RecordingCalendarSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        self.calls.lock().unwrap().clone()
    }

    fn check_fail(&self) -> Result<(), SideEffectError> {
        if *self.fail.lock().unwrap() {
            Err(SideEffectError("calendar unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl CalendarSink for RecordingCalendarSink {
    fn create_event(&self, appointment: &AppointmentRow) -> Result<String, SideEffectError> {
        self.check_fail()?;
        self.calls.lock().unwrap().push(CalendarCall::Created {
            appointment_id: appointment.id.clone(),
        });
        Ok(format!("evt-{}", appointment.id))
    }

    fn update_event(
        &self,
        event_id: &str,
        _appointment: &AppointmentRow,
    ) -> Result<(), SideEffectError> {
        self.check_fail()?;
        self.calls.lock().unwrap().push(CalendarCall::Updated {
            event_id: event_id.to_string(),
        });
        Ok(())
    }

    fn delete_event(&self, event_id: &str) -> Result<(), SideEffectError> {
        self.check_fail()?;
        self.calls.lock().unwrap().push(CalendarCall::Deleted {
            event_id: event_id.to_string(),
        });
        Ok(())
    }
}
