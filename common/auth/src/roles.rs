use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform roles, ordered from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    SuperModerator,
    Landlord,
    Agent,
    Tenant,
}

/// Roles that are never subject to organization subscription gating.
pub const ELEVATED_ROLES: &[Role] = &[Role::SuperAdmin, Role::SuperModerator];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::SuperModerator => "super_moderator",
            Role::Landlord => "landlord",
            Role::Agent => "agent",
            Role::Tenant => "tenant",
        }
    }

    /// Platform-operator roles skip the organization subscription gate.
    pub fn is_elevated(&self) -> bool {
        ELEVATED_ROLES.contains(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role '{0}'")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    // Accepts both the wire form ("super_admin") and the display form
    // ("Super Admin") used by older clients.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "super_admin" => Ok(Role::SuperAdmin),
            "super_moderator" => Ok(Role::SuperModerator),
            "landlord" => Ok(Role::Landlord),
            "agent" => Ok(Role::Agent),
            "tenant" => Ok(Role::Tenant),
            _ => Err(ParseRoleError(value.to_string())),
        }
    }
}
