//! Tenant, customer and editor-membership repository.
//!
//! Tenants carry the default revision-round policy; customers may carry an
//! explicit override that takes precedence over the tenant default.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A tenant (partner business account) row.
#[derive(Debug, Clone)]
pub struct TenantRow {
    pub id: String,
    pub name: String,
    pub revision_limit_enabled: bool,
    pub revision_round_limit: u32,
    pub created_at: String,
}

impl TenantRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            revision_limit_enabled: row.get("revision_limit_enabled")?,
            revision_round_limit: row.get("revision_round_limit")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Explicit per-customer revision-round override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionOverride {
    Unlimited,
    Limit(u32),
}

/// A customer row.
#[derive(Debug, Clone)]
pub struct CustomerRow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Raw override column: `"unlimited"`, a decimal number, or NULL.
    pub revision_override: Option<String>,
    pub created_at: String,
}

impl CustomerRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            name: row.get("name")?,
            revision_override: row.get("revision_override")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Parses the stored override. Unparseable values are treated as no
    /// override so a bad row falls back to the tenant default.
    pub fn parsed_override(&self) -> Option<RevisionOverride> {
        match self.revision_override.as_deref() {
            Some("unlimited") => Some(RevisionOverride::Unlimited),
            Some(raw) => raw.parse::<u32>().ok().map(RevisionOverride::Limit),
            None => None,
        }
    }
}

/// An editor's membership in a tenant-editor partnership.
#[derive(Debug, Clone)]
pub struct MembershipRow {
    pub editor_id: String,
    pub tenant_id: String,
    pub status: String,
    pub created_at: String,
}

impl MembershipRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            editor_id: row.get("editor_id")?,
            tenant_id: row.get("tenant_id")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

pub fn insert_tenant(db: &Database, tenant: &TenantRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO tenants (id, name, revision_limit_enabled, revision_round_limit, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tenant.id,
                tenant.name,
                tenant.revision_limit_enabled,
                tenant.revision_round_limit,
                tenant.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_tenant(db: &Database, id: &str) -> Result<Option<TenantRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM tenants WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], TenantRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn insert_customer(db: &Database, customer: &CustomerRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO customers (id, tenant_id, name, revision_override, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                customer.id,
                customer.tenant_id,
                customer.name,
                customer.revision_override,
                customer.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_customer(db: &Database, id: &str) -> Result<Option<CustomerRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM customers WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], CustomerRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn insert_membership(db: &Database, membership: &MembershipRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO editor_memberships (editor_id, tenant_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                membership.editor_id,
                membership.tenant_id,
                membership.status,
                membership.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Looks up an editor's membership with the given tenant.
pub fn find_membership(
    db: &Database,
    editor_id: &str,
    tenant_id: &str,
) -> Result<Option<MembershipRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM editor_memberships WHERE editor_id = ?1 AND tenant_id = ?2")?;
        let mut rows = stmt.query_map(params![editor_id, tenant_id], MembershipRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn set_membership_status(
    db: &Database,
    editor_id: &str,
    tenant_id: &str,
    status: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE editor_memberships SET status = ?3 WHERE editor_id = ?1 AND tenant_id = ?2",
            params![editor_id, tenant_id, status],
        )?;
        Ok(())
    })
}
