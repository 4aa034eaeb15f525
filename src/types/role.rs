use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role assigned to a user account.
///
/// - `admin` has full access to every administrative endpoint.
/// - `manager` can browse the whole registry catalog.
/// - `user` sees only repositories granted through access rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::User];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }

    /// Returns true if `role` names one of the known roles.
    #[must_use]
    pub fn is_valid(role: &str) -> bool {
        role.parse::<Role>().is_ok()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("role '{s}' not allowed"))
    }
}
