mod filter;
mod sanitize;
mod schema;
mod sqlite;

use std::collections::BTreeMap;

use serde_json::Value;

pub use filter::{IDS_KEY, ListResponse, QUERY_KEY, QueryFilter, REPOSITORIES_BY_USER_ACCESS};
pub use sanitize::{sanitize_identifier, sanitize_key_value};
pub use schema::{
    ACCESS_TABLE, Bootstrap, DEFAULT_ADMIN_LOGIN, DEFAULT_ADMIN_PASSWORD, DEFAULT_GROUP_NAME,
    GROUPS_TABLE, REPOSITORIES_TABLE, TableInit, TableOutcome, USERS_TABLE,
};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the persistence interface.
///
/// `get_*` return [`Error::NotFound`](crate::Error::NotFound) when no row
/// matches; `update_*` return `NotUpdated` and `delete_*` return `NotFound`
/// when no row was affected. `find_*` never fails on an empty result.
pub trait Store: Send + Sync {
    /// Releases the handle; later calls fail with a connection error.
    fn close(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &mut User) -> Result<()>;
    fn get_user(&self, lookup: &UserLookup) -> Result<User>;
    fn find_users(&self, filter: &QueryFilter) -> Result<ListResponse<User>>;
    /// An empty password leaves the stored hash untouched.
    fn update_user(&self, user: &User) -> Result<()>;
    fn delete_user(&self, id: i64) -> Result<()>;

    // Group operations
    fn create_group(&self, group: &mut Group) -> Result<()>;
    fn get_group(&self, id: i64) -> Result<Group>;
    fn find_groups(&self, filter: &QueryFilter) -> Result<ListResponse<Group>>;
    fn update_group(&self, group: &Group) -> Result<()>;
    fn delete_group(&self, id: i64) -> Result<()>;

    // Access operations
    fn create_access(&self, access: &mut Access) -> Result<()>;
    fn get_access(&self, id: i64) -> Result<Access>;
    fn find_access(&self, filter: &QueryFilter) -> Result<ListResponse<Access>>;
    fn update_access(&self, access: &Access) -> Result<()>;
    fn delete_access(&self, id: i64) -> Result<()>;
    fn delete_access_by_owner(&self, owner_id: i64, is_group: bool) -> Result<usize>;
    /// Deletes repository rules whose resource no longer names any repository entry.
    fn access_garbage_collector(&self) -> Result<usize>;

    // Repository operations
    fn create_repository(&self, entry: &mut RegistryEntry) -> Result<()>;
    fn get_repository(&self, id: i64) -> Result<RegistryEntry>;
    /// Exact lookup of the entry of a `(repository, tag)` pair. Names are
    /// matched as given, without filter scrubbing.
    fn get_repository_by_name_tag(&self, name: &str, tag: &str) -> Result<Option<RegistryEntry>>;
    fn find_repositories(&self, filter: &QueryFilter) -> Result<ListResponse<RegistryEntry>>;
    fn update_repository(&self, entry: &RegistryEntry) -> Result<()>;
    /// Sets the `data` columns on every entry matching all of `conditions`.
    fn update_repository_fields(
        &self,
        conditions: &BTreeMap<String, Value>,
        data: &BTreeMap<String, Value>,
    ) -> Result<()>;
    fn delete_repository(&self, id: i64) -> Result<()>;
    fn delete_repository_by_digest(&self, digest: &str) -> Result<usize>;
    /// Deletes entries last pushed before `sync_date` (unix seconds).
    fn repository_garbage_collector(&self, sync_date: i64) -> Result<usize>;
}
