//! Appointment repository — scheduled visits tied to a job.
//!
//! Appointments carrying an external calendar reference are never physically
//! removed; cancellation is a status change.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw appointment row from the database.
#[derive(Debug, Clone)]
pub struct AppointmentRow {
    pub id: String,
    pub job_id: String,
    pub tenant_id: String,
    pub start_at: String,
    pub duration_minutes: u32,
    pub assigned_user: Option<String>,
    pub status: String,
    pub calendar_event_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            tenant_id: row.get("tenant_id")?,
            start_at: row.get("start_at")?,
            duration_minutes: row.get("duration_minutes")?,
            assigned_user: row.get("assigned_user")?,
            status: row.get("status")?,
            calendar_event_id: row.get("calendar_event_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn insert(db: &Database, appt: &AppointmentRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO appointments (id, job_id, tenant_id, start_at, duration_minutes,
             assigned_user, status, calendar_event_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                appt.id,
                appt.job_id,
                appt.tenant_id,
                appt.start_at,
                appt.duration_minutes,
                appt.assigned_user,
                appt.status,
                appt.calendar_event_id,
                appt.created_at,
                appt.updated_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<AppointmentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM appointments WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], AppointmentRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists appointments for a job, earliest first. A job may carry several
/// (reschedule-by-new-appointment).
pub fn list_by_job(db: &Database, job_id: &str) -> Result<Vec<AppointmentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM appointments WHERE job_id = ?1 ORDER BY start_at ASC")?;
        let rows: Vec<AppointmentRow> = stmt
            .query_map(params![job_id], AppointmentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Updates the schedule of an appointment.
pub fn reschedule(
    db: &Database,
    id: &str,
    start_at: &str,
    duration_minutes: u32,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE appointments SET start_at = ?2, duration_minutes = ?3, updated_at = ?4
             WHERE id = ?1",
            params![id, start_at, duration_minutes, updated_at],
        )?;
        Ok(())
    })
}

/// Marks an appointment cancelled. Conditional on it still being scheduled;
/// returns whether the row was updated.
pub fn cancel(db: &Database, id: &str, updated_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE appointments SET status = 'cancelled', updated_at = ?2
             WHERE id = ?1 AND status = 'scheduled'",
            params![id, updated_at],
        )?;
        Ok(affected == 1)
    })
}

/// Stores the external calendar event reference once the sink created it.
pub fn set_calendar_event(
    db: &Database,
    id: &str,
    event_id: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE appointments SET calendar_event_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, event_id, updated_at],
        )?;
        Ok(())
    })
}
