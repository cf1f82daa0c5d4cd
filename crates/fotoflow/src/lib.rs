pub mod auth;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod organizer;
pub mod storage;
pub mod workflow;

pub use auth::{Principal, Role};
pub use broadcast::{
    CalendarSink, NoopCalendarSink, Notification, NotificationBroadcaster, NotificationKind,
};
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{ConfigError, FotoflowError, Result, StorageError, WorkflowError};
pub use organizer::{Audience, Organizer};
pub use storage::{FsObjectStore, ObjectStore};
pub use workflow::{
    JobStatus, OrderStatus, RevisionDecision, RoundLimit, ServiceRequest, WorkflowService,
};
