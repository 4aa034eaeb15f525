use serde::{Deserialize, Serialize};

use super::Role;

/// Owner id of access rules shared with anonymous clients.
pub const ANONYMOUS_USER_ID: i64 = -1000;

/// Owner id of access rules shared with every registered user.
pub const REGISTERED_USER_ID: i64 = -999;

/// Group assigned to users created without one. Seeded at bootstrap.
pub const DEFAULT_GROUP_ID: i64 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub name: String,
    /// Argon2 PHC string once stored. Empty on update means "keep the stored hash".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub role: String,
    /// References `Group::id`; not enforced by the store.
    pub group: i64,
    pub disabled: bool,
    pub description: String,
}

impl User {
    /// Parsed role, `None` when the stored role is not a known one.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// A grant of actions on a named registry resource to a user or a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Access {
    pub id: i64,
    /// A `User::id` or a `Group::id`, depending on `is_group`.
    #[serde(rename = "owner_id")]
    pub owner: i64,
    pub is_group: bool,
    pub name: String,
    /// Resource type, e.g. `repository` or `registry`.
    #[serde(rename = "type")]
    pub resource_type: String,
    pub resource_name: String,
    /// Actions delimited by colons or spaces, e.g. `pull:push`.
    pub action: String,
    pub disabled: bool,
}

/// One published tag of a repository in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryEntry {
    pub id: i64,
    pub repository_name: String,
    pub tag: String,
    pub digest: String,
    pub config_digest: String,
    pub size: i64,
    pub pull_counter: i64,
    /// Unix seconds of the last push seen for this tag.
    pub timestamp: i64,
    /// Raw notification event that produced the entry.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw: String,
}

/// How a caller identifies a user: numeric id or login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Id(i64),
    Login(String),
}

impl UserLookup {
    /// Identifiers that parse as integers are ids, anything else is a login.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(id) => UserLookup::Id(id),
            Err(_) => UserLookup::Login(value.to_string()),
        }
    }
}

impl From<i64> for UserLookup {
    fn from(id: i64) -> Self {
        UserLookup::Id(id)
    }
}

impl From<&str> for UserLookup {
    fn from(value: &str) -> Self {
        UserLookup::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_lookup_parse() {
        assert_eq!(UserLookup::parse("123"), UserLookup::Id(123));
        assert_eq!(UserLookup::parse("-5"), UserLookup::Id(-5));
        assert_eq!(
            UserLookup::parse("admin"),
            UserLookup::Login("admin".to_string())
        );
        assert_eq!(
            UserLookup::parse("12ab"),
            UserLookup::Login("12ab".to_string())
        );
    }

    #[test]
    fn test_user_password_not_serialized_when_empty() {
        let user = User {
            id: 1,
            login: "admin".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["login"], "admin");
    }

    #[test]
    fn test_access_json_field_names() {
        let access: Access = serde_json::from_value(serde_json::json!({
            "owner_id": 7,
            "type": "repository",
            "resource_name": "app/web",
            "action": "pull"
        }))
        .unwrap();
        assert_eq!(access.owner, 7);
        assert_eq!(access.resource_type, "repository");
        assert!(!access.is_group);
    }
}
