//! Authenticated principal passed into every workflow operation.
//!
//! Identity and tenancy are resolved by an external provider; the engine
//! trusts this input and only enforces tenant/role/assignment guards.

use serde::{Deserialize, Serialize};

/// Role of the acting user within their tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    TenantOwner,
    TenantAdmin,
    Editor,
    Customer,
}

impl Role {
    /// Tenant staff (owner or admin) may act on any order of their tenant,
    /// e.g. in the QC gate's dual-role access.
    pub fn is_tenant_staff(&self) -> bool {
        matches!(self, Role::TenantOwner | Role::TenantAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::TenantOwner => "tenant_owner",
            Role::TenantAdmin => "tenant_admin",
            Role::Editor => "editor",
            Role::Customer => "customer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated request principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
    pub tenant_id: String,
}

impl Principal {
    pub fn new(user_id: &str, role: Role, tenant_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role,
            tenant_id: tenant_id.to_string(),
        }
    }
}
