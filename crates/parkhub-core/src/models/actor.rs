//! Actor identity and roles
//!
//! Authentication lives upstream; by the time a request reaches the engine
//! it carries an already-verified actor identity and role.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role of an acting party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular customer
    #[default]
    Customer,
    /// Facility administrator
    Admin,
    /// Platform superadmin
    Superadmin,
}

impl Role {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "customer" | "user" => Some(Role::Customer),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::Superadmin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Admin => write!(f, "admin"),
            Role::Superadmin => write!(f, "superadmin"),
        }
    }
}

/// An authenticated acting party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identity of the actor
    pub id: Uuid,
    /// Role of the actor
    pub role: Role,
}

impl Actor {
    /// Create a new actor
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Check whether the actor may use admin-only capabilities
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Superadmin)
    }
}
