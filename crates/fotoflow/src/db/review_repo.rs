//! Job review repository — at most one customer review per job.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A customer-submitted job review. Created once, never updated.
#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: String,
    pub job_id: String,
    pub rating: u32,
    pub body: Option<String>,
    pub created_at: String,
}

impl ReviewRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            rating: row.get("rating")?,
            body: row.get("body")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts the review. The UNIQUE constraint on `job_id` makes a second
/// submission fail; callers surface that as a conflict.
pub fn insert(db: &Database, review: &ReviewRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO job_reviews (id, job_id, rating, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                review.id,
                review.job_id,
                review.rating,
                review.body,
                review.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_job(db: &Database, job_id: &str) -> Result<Option<ReviewRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM job_reviews WHERE job_id = ?1")?;
        let mut rows = stmt.query_map(params![job_id], ReviewRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}
