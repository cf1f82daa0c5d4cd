//! Order service line items — one row per requested service on an order.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A service line item on an order. Immutable after creation except by
/// explicit `update`.
#[derive(Debug, Clone)]
pub struct OrderServiceRow {
    pub id: String,
    pub order_id: String,
    pub service_ref: String,
    pub quantity: u32,
    pub instructions: Option<String>,
    /// JSON array of requested export types (e.g. `["jpeg","raw"]`).
    pub export_types: Option<String>,
    pub created_at: String,
}

impl OrderServiceRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            order_id: row.get("order_id")?,
            service_ref: row.get("service_ref")?,
            quantity: row.get("quantity")?,
            instructions: row.get("instructions")?,
            export_types: row.get("export_types")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(db: &Database, service: &OrderServiceRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO order_services (id, order_id, service_ref, quantity, instructions,
             export_types, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                service.id,
                service.order_id,
                service.service_ref,
                service.quantity,
                service.instructions,
                service.export_types,
                service.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn list_by_order(db: &Database, order_id: &str) -> Result<Vec<OrderServiceRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM order_services WHERE order_id = ?1 ORDER BY created_at ASC")?;
        let rows: Vec<OrderServiceRow> = stmt
            .query_map(params![order_id], OrderServiceRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Explicit edit of a line item.
pub fn update(db: &Database, service: &OrderServiceRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE order_services SET service_ref = ?2, quantity = ?3, instructions = ?4,
             export_types = ?5 WHERE id = ?1",
            params![
                service.id,
                service.service_ref,
                service.quantity,
                service.instructions,
                service.export_types,
            ],
        )?;
        Ok(())
    })
}
