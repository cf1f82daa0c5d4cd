//! Side-effect sinks for workflow transitions.
//!
//! Notifications and calendar sync are one-way, best-effort: a failure here
//! is logged by the caller and never rolls back the state change that
//! triggered it.

pub mod calendar;
pub mod notification;

pub use calendar::{CalendarSink, NoopCalendarSink, RecordingCalendarSink, SideEffectError};
pub use notification::{Notification, NotificationBroadcaster, NotificationKind};
