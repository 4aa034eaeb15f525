use std::fmt;

use crate::error::{Error, Result};

pub const USERS_TABLE: &str = "users";
pub const GROUPS_TABLE: &str = "groups";
pub const ACCESS_TABLE: &str = "access";
pub const REPOSITORIES_TABLE: &str = "repositories";

/// Login and password of the user seeded into a fresh `users` table.
pub const DEFAULT_ADMIN_LOGIN: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Name of the group seeded into a fresh `groups` table.
pub const DEFAULT_GROUP_NAME: &str = "default";

pub(crate) struct TableSchema {
    pub name: &'static str,
    pub ddl: &'static str,
}

pub(crate) const USERS: TableSchema = TableSchema {
    name: USERS_TABLE,
    ddl: r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    login TEXT NOT NULL UNIQUE,
    name TEXT,
    password TEXT,          -- argon2id hash with embedded salt
    role TEXT,
    user_group INTEGER,     -- groups.id, not enforced
    disabled INTEGER,
    description TEXT
)"#,
};

pub(crate) const GROUPS: TableSchema = TableSchema {
    name: GROUPS_TABLE,
    ddl: r#"
CREATE TABLE groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT
)"#,
};

pub(crate) const ACCESS: TableSchema = TableSchema {
    name: ACCESS_TABLE,
    ddl: r#"
CREATE TABLE access (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,  -- users.id or groups.id depending on is_group
    is_group INTEGER,
    name TEXT,
    resource_type TEXT,
    resource_name TEXT,
    action TEXT,
    disabled INTEGER,
    UNIQUE(owner_id, resource_type, resource_name, action)
);
CREATE INDEX IF NOT EXISTS idx_access_resource_name ON access(resource_name);
"#,
};

pub(crate) const REPOSITORIES: TableSchema = TableSchema {
    name: REPOSITORIES_TABLE,
    ddl: r#"
CREATE TABLE repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_name TEXT NOT NULL,
    tag TEXT NOT NULL,
    digest TEXT NOT NULL,
    config_digest TEXT,
    size INTEGER,
    pull_counter INTEGER,
    timestamp INTEGER,      -- unix seconds of the last push
    raw TEXT,               -- notification event payload
    UNIQUE(repository_name, tag)
);
CREATE INDEX IF NOT EXISTS idx_repositories_digest ON repositories(digest);
"#,
};

/// What happened to one table while bootstrapping.
#[derive(Debug)]
pub enum TableOutcome {
    Created,
    AlreadyExists,
    Failed(Error),
}

#[derive(Debug)]
pub struct TableInit {
    pub table: &'static str,
    pub outcome: TableOutcome,
}

/// Per-table report of a schema bootstrap.
#[derive(Debug, Default)]
pub struct Bootstrap {
    pub tables: Vec<TableInit>,
}

impl Bootstrap {
    /// True when every table existed before, i.e. a warm start.
    #[must_use]
    pub fn is_warm_start(&self) -> bool {
        self.tables
            .iter()
            .all(|t| matches!(t.outcome, TableOutcome::AlreadyExists))
    }

    /// Names of the tables created by this bootstrap.
    pub fn created(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables
            .iter()
            .filter(|t| matches!(t.outcome, TableOutcome::Created))
            .map(|t| t.table)
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.tables
            .iter()
            .any(|t| matches!(t.outcome, TableOutcome::Failed(_)))
    }

    /// Turns failed tables into an error; "already exists" is not a failure.
    pub fn into_result(self) -> Result<Self> {
        if !self.has_failures() {
            return Ok(self);
        }
        let failures = self
            .tables
            .iter()
            .filter_map(|t| match &t.outcome {
                TableOutcome::Failed(e) => Some(format!("{}: {e}", t.table)),
                _ => None,
            })
            .collect::<Vec<_>>();
        Err(Error::Bootstrap(failures.join("; ")))
    }
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableOutcome::Created => f.write_str("created"),
            TableOutcome::AlreadyExists => f.write_str("already exists"),
            TableOutcome::Failed(e) => write!(f, "failed ({e})"),
        }
    }
}

impl fmt::Display for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .tables
            .iter()
            .map(|t| format!("{} {}", t.table, t.outcome))
            .collect::<Vec<_>>();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<TableOutcome>) -> Bootstrap {
        let names = [USERS_TABLE, GROUPS_TABLE, ACCESS_TABLE, REPOSITORIES_TABLE];
        Bootstrap {
            tables: names
                .into_iter()
                .zip(outcomes)
                .map(|(table, outcome)| TableInit { table, outcome })
                .collect(),
        }
    }

    #[test]
    fn test_warm_start_is_not_a_failure() {
        let bootstrap = report(vec![
            TableOutcome::AlreadyExists,
            TableOutcome::AlreadyExists,
            TableOutcome::AlreadyExists,
            TableOutcome::AlreadyExists,
        ]);
        assert!(bootstrap.is_warm_start());
        assert_eq!(
            bootstrap.to_string(),
            "users already exists, groups already exists, access already exists, repositories already exists"
        );
        assert!(bootstrap.into_result().is_ok());
    }

    #[test]
    fn test_failed_table_is_reported() {
        let bootstrap = report(vec![
            TableOutcome::Created,
            TableOutcome::AlreadyExists,
            TableOutcome::Failed(Error::Config("disk on fire".into())),
            TableOutcome::Created,
        ]);
        assert!(!bootstrap.is_warm_start());
        assert_eq!(bootstrap.created().collect::<Vec<_>>(), vec!["users", "repositories"]);

        let err = bootstrap.into_result().unwrap_err();
        assert!(err.to_string().contains("access"));
        assert!(err.to_string().contains("disk on fire"));
    }
}
