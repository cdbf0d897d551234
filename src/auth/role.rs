//! Role checks on a validated session.
//!
//! Roles are flat: a route names the roles it accepts and nothing else gets
//! in. `admin` does not imply `trader` or the other way round.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Trader,
    Admin,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Trader => "trader",
            Role::Admin => "admin",
            Role::Viewer => "viewer",
        }
    }

    /// Reads the provider's `role` trait. Missing, non-string or unknown
    /// values map to the default role.
    pub fn from_trait(value: Option<&Value>) -> Role {
        match value.and_then(Value::as_str) {
            Some("trader") => Role::Trader,
            Some("admin") => Role::Admin,
            Some("viewer") => Role::Viewer,
            _ => Role::default(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { required: String, actual: Role },
}

/// Set of roles a route accepts. Callers that want "admin or trader" list
/// both explicitly.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    allowed: Vec<Role>,
}

impl AuthorizationGate {
    pub fn require(role: Role) -> Self {
        Self {
            allowed: vec![role],
        }
    }

    pub fn any_of(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut allowed = Vec::new();
        for role in roles {
            if !allowed.contains(&role) {
                allowed.push(role);
            }
        }
        Self { allowed }
    }

    pub fn required_label(&self) -> String {
        self.allowed
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn authorize(&self, session: &Session) -> Decision {
        let actual = session.traits.role();
        if self.allowed.contains(&actual) {
            Decision::Allow
        } else {
            Decision::Deny {
                required: self.required_label(),
                actual,
            }
        }
    }
}

/// Single-role check.
pub fn authorize(session: &Session, required: Role) -> Decision {
    AuthorizationGate::require(required).authorize(session)
}
