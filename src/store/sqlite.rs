use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::Store;
use super::filter::{CompiledFilter, ListResponse, QueryFilter, column_pairs, compile};
use super::schema::{
    ACCESS, ACCESS_TABLE, Bootstrap, DEFAULT_ADMIN_LOGIN, DEFAULT_ADMIN_PASSWORD,
    DEFAULT_GROUP_NAME, GROUPS, GROUPS_TABLE, REPOSITORIES, REPOSITORIES_TABLE, TableInit,
    TableOutcome, TableSchema, USERS, USERS_TABLE,
};
use crate::auth::hash_password;
use crate::error::{Error, QueryContext, Result};
use crate::types::*;

type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// How one table is listed: which columns to select, which columns the
/// full-text key searches, and an optional join for owner-scoped listings.
struct Collection {
    table: &'static str,
    columns: &'static str,
    search_fields: &'static [&'static str],
    access_join: Option<&'static str>,
}

impl Collection {
    fn source(&self, filter: &QueryFilter) -> String {
        match self.access_join {
            Some(join) if filter.by_user_access() => format!("{} {join}", self.table),
            _ => self.table.to_string(),
        }
    }
}

const USER_COLUMNS: &str =
    "id, login, name, password, role, user_group, disabled, description";
const GROUP_COLUMNS: &str = "id, name, description";
const ACCESS_COLUMNS: &str =
    "id, owner_id, is_group, name, resource_type, resource_name, action, disabled";
const REPOSITORY_COLUMNS: &str = "repositories.id AS id, repository_name, tag, digest, \
     config_digest, size, pull_counter, timestamp, raw";

const USER_LIST: Collection = Collection {
    table: USERS_TABLE,
    columns: USER_COLUMNS,
    search_fields: &["login", "name"],
    access_join: None,
};

const GROUP_LIST: Collection = Collection {
    table: GROUPS_TABLE,
    columns: GROUP_COLUMNS,
    search_fields: &["name"],
    access_join: None,
};

const ACCESS_LIST: Collection = Collection {
    table: ACCESS_TABLE,
    columns: ACCESS_COLUMNS,
    search_fields: &["name", "resource_name"],
    access_join: None,
};

const REPOSITORY_LIST: Collection = Collection {
    table: REPOSITORIES_TABLE,
    columns: REPOSITORY_COLUMNS,
    search_fields: &["repository_name", "tag"],
    access_join: Some("INNER JOIN access ON repositories.repository_name = access.resource_name"),
};

/// The embedded store: one SQLite file holding users, groups, access rules
/// and repository entries.
///
/// A store starts disconnected; [`SqliteStore::connect`] opens the file,
/// bootstraps the schema and ties the handle to a cancellation token.
pub struct SqliteStore {
    path: PathBuf,
    admin_password: String,
    conn: SharedConnection,
    /// Stops the shutdown waiter of the current handle.
    waiter: Mutex<Option<CancellationToken>>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            conn: Arc::new(Mutex::new(None)),
            waiter: Mutex::new(None),
        }
    }

    /// Password given to the seed admin user when the `users` table is created.
    #[must_use]
    pub fn with_admin_password(mut self, password: impl Into<String>) -> Self {
        self.admin_password = password.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the database file, creating it if absent, and bootstraps the
    /// schema. The handle is closed once `shutdown` is cancelled.
    ///
    /// Connecting again replaces the handle; the token of an earlier
    /// connection no longer affects the new one.
    ///
    /// Tables that already exist are reported as such and are not an error.
    pub fn connect(&self, shutdown: CancellationToken) -> Result<Bootstrap> {
        let conn = Connection::open(&self.path).context("failed to open store")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let stop = CancellationToken::new();
        {
            let mut guard = self.lock();
            // Stale waiters are stopped under the handle lock.
            self.stop_waiter();
            if let Some(previous) = guard.replace(conn) {
                let _ = previous.close();
            }
            *self.waiter.lock().unwrap_or_else(|e| e.into_inner()) = Some(stop.clone());
        }
        watch_shutdown(Arc::clone(&self.conn), shutdown, stop)?;

        let report = self.init_tables()?;
        if !self.path.exists() {
            return Err(Error::StoreMissing(self.path.clone()));
        }
        report.into_result()
    }

    /// Checks each table and creates the missing ones along with their seed rows.
    pub fn init_tables(&self) -> Result<Bootstrap> {
        self.with_conn(|conn| {
            let tables = [&USERS, &GROUPS, &ACCESS, &REPOSITORIES]
                .into_iter()
                .map(|schema| TableInit {
                    table: schema.name,
                    outcome: self.init_table(conn, schema),
                })
                .collect();
            Ok(Bootstrap { tables })
        })
    }

    fn init_table(&self, conn: &Connection, schema: &TableSchema) -> TableOutcome {
        match table_exists(conn, schema.name) {
            Ok(true) => TableOutcome::AlreadyExists,
            Ok(false) => match self.create_table(conn, schema) {
                Ok(()) => TableOutcome::Created,
                Err(e) => TableOutcome::Failed(e),
            },
            Err(e) => TableOutcome::Failed(e),
        }
    }

    fn create_table(&self, conn: &Connection, schema: &TableSchema) -> Result<()> {
        let tx = conn
            .unchecked_transaction()
            .context("failed to begin table creation")?;
        tx.execute_batch(schema.ddl)
            .context("failed to create table")?;

        match schema.name {
            USERS_TABLE => {
                let hash = hash_password(&self.admin_password)?;
                tx.execute(
                    "INSERT INTO users (login, name, password, role, user_group, disabled, description)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        DEFAULT_ADMIN_LOGIN,
                        "Administrator",
                        hash,
                        Role::Admin.as_str(),
                        DEFAULT_GROUP_ID,
                        false,
                        "Default administration user",
                    ],
                )
                .context("failed to create default admin user")?;
            }
            GROUPS_TABLE => {
                tx.execute(
                    "INSERT INTO groups (name, description) VALUES (?1, ?2)",
                    params![DEFAULT_GROUP_NAME, "Default administration group"],
                )
                .context("failed to create default group")?;
            }
            _ => {}
        }

        tx.commit().context("failed to commit table creation")
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stop_waiter(&self) {
        if let Some(stop) = self.waiter.lock().unwrap_or_else(|e| e.into_inner()).take() {
            stop.cancel();
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(Error::ConnectionClosed)?;
        f(conn)
    }

    fn find<T>(
        &self,
        collection: &Collection,
        filter: &QueryFilter,
        context: &'static str,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<ListResponse<T>> {
        self.with_conn(|conn| {
            let compiled = compile(filter, collection.table, collection.search_fields)?;

            let total = count_matching(conn, collection, filter);
            if total == 0 {
                return Ok(ListResponse::empty());
            }

            let sql = format!(
                "SELECT {} FROM {} {}",
                collection.columns,
                collection.source(filter),
                compiled.all_clauses()
            );
            let mut stmt = conn.prepare(&sql).context(context)?;
            let rows = stmt
                .query_map(params_from_iter(compiled.params.iter()), map)
                .context(context)?;
            let data = rows
                .collect::<std::result::Result<Vec<_>, _>>()
                .context(context)?;

            Ok(ListResponse { total, data })
        })
    }

    fn execute(&self, sql: &str, params: impl rusqlite::Params, context: &'static str) -> Result<usize> {
        self.with_conn(|conn| conn.execute(sql, params).context(context))
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        self.stop_waiter();
        let _ = close_connection(&self.conn);
    }
}

/// Closes the shared handle once `shutdown` fires, unless `stop` was
/// cancelled first. The waiter runs on its own thread so the store does not
/// depend on an ambient async runtime.
fn watch_shutdown(
    conn: SharedConnection,
    shutdown: CancellationToken,
    stop: CancellationToken,
) -> Result<()> {
    std::thread::Builder::new()
        .name("store-shutdown".to_string())
        .spawn(move || {
            let Ok(runtime) = tokio::runtime::Builder::new_current_thread().build() else {
                return;
            };
            runtime.block_on(async {
                tokio::select! {
                    () = shutdown.cancelled() => {}
                    () = stop.cancelled() => {}
                }
            });

            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            if stop.is_cancelled() {
                return;
            }
            if let Some(handle) = guard.take() {
                let _ = handle.close();
            }
        })?;
    Ok(())
}

fn close_connection(conn: &Mutex<Option<Connection>>) -> Result<()> {
    let taken = conn.lock().unwrap_or_else(|e| e.into_inner()).take();
    match taken {
        Some(conn) => conn.close().map_err(|(_, e)| Error::from(e)),
        None => Ok(()),
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .context("failed to check table")
}

/// Counts the rows matching `filter` regardless of its range. Grouped filters
/// count distinct values of the first search field. Any failure counts as 0.
fn count_matching(conn: &Connection, collection: &Collection, filter: &QueryFilter) -> i64 {
    let unpaged = QueryFilter {
        range: [0, 0],
        group_by_field: false,
        ..filter.clone()
    };
    let Ok(CompiledFilter {
        where_clause,
        params,
        ..
    }) = compile(&unpaged, collection.table, collection.search_fields)
    else {
        return 0;
    };

    let counter = match collection.search_fields.first() {
        Some(field) if filter.group_by_field => format!("COUNT(DISTINCT {field})"),
        _ => "COUNT(*)".to_string(),
    };
    let sql = format!(
        "SELECT {counter} FROM {} {where_clause}",
        collection.source(filter)
    );

    conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
        .unwrap_or(0)
}

fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn integer(row: &Row<'_>, idx: usize) -> rusqlite::Result<i64> {
    Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or_default())
}

fn flag(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(row.get::<_, Option<bool>>(idx)?.unwrap_or_default())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        login: text(row, 1)?,
        name: text(row, 2)?,
        password: text(row, 3)?,
        role: text(row, 4)?,
        group: integer(row, 5)?,
        disabled: flag(row, 6)?,
        description: text(row, 7)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: text(row, 1)?,
        description: text(row, 2)?,
    })
}

fn access_from_row(row: &Row<'_>) -> rusqlite::Result<Access> {
    Ok(Access {
        id: row.get(0)?,
        owner: integer(row, 1)?,
        is_group: flag(row, 2)?,
        name: text(row, 3)?,
        resource_type: text(row, 4)?,
        resource_name: text(row, 5)?,
        action: text(row, 6)?,
        disabled: flag(row, 7)?,
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<RegistryEntry> {
    Ok(RegistryEntry {
        id: row.get(0)?,
        repository_name: text(row, 1)?,
        tag: text(row, 2)?,
        digest: text(row, 3)?,
        config_digest: text(row, 4)?,
        size: integer(row, 5)?,
        pull_counter: integer(row, 6)?,
        timestamp: integer(row, 7)?,
        raw: text(row, 8)?,
    })
}

/// Collects every missing field so one error names them all.
fn require(entity: &str, checks: &[(&str, bool)], extra: Option<String>) -> Result<()> {
    let mut missing = checks
        .iter()
        .filter(|(_, present)| !present)
        .map(|(field, _)| (*field).to_string())
        .collect::<Vec<_>>();
    missing.extend(extra);
    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::Validation(format!(
        "required {entity} fields not set: {}",
        missing.join(", ")
    )))
}

fn invalid_role(role: &str) -> Option<String> {
    (!Role::is_valid(role)).then(|| format!("role '{role}' not allowed"))
}

fn expect_updated(rows: usize) -> Result<()> {
    if rows == 0 {
        return Err(Error::NotUpdated);
    }
    Ok(())
}

fn expect_deleted(rows: usize) -> Result<usize> {
    if rows == 0 {
        return Err(Error::NotFound);
    }
    Ok(rows)
}

impl Store for SqliteStore {
    fn close(&self) -> Result<()> {
        self.stop_waiter();
        close_connection(&self.conn)
    }

    // User operations

    fn create_user(&self, user: &mut User) -> Result<()> {
        require(
            "user",
            &[
                ("Login", !user.login.is_empty()),
                ("Name", !user.name.is_empty()),
                ("Password", !user.password.is_empty()),
            ],
            invalid_role(&user.role),
        )?;

        if user.group == 0 {
            user.group = DEFAULT_GROUP_ID;
        }
        user.password = hash_password(&user.password)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (login, name, password, role, user_group, disabled, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.login,
                    user.name,
                    user.password,
                    user.role,
                    user.group,
                    user.disabled,
                    user.description,
                ],
            )
            .context("failed to add new user")?;
            user.id = conn.last_insert_rowid();
            Ok(())
        })
    }

    fn get_user(&self, lookup: &UserLookup) -> Result<User> {
        self.with_conn(|conn| {
            let found = match lookup {
                UserLookup::Id(id) => conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                        params![id],
                        user_from_row,
                    )
                    .optional(),
                UserLookup::Login(login) => conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE login = ?1"),
                        params![login],
                        user_from_row,
                    )
                    .optional(),
            };
            found.context("failed to get user")?.ok_or(Error::NotFound)
        })
    }

    fn find_users(&self, filter: &QueryFilter) -> Result<ListResponse<User>> {
        let mut users = self.find(&USER_LIST, filter, "failed to get users list", user_from_row)?;
        for user in &mut users.data {
            user.password.clear();
        }
        Ok(users)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        if let Some(role) = invalid_role(&user.role) {
            return Err(Error::Validation(role));
        }

        let rows = if user.password.is_empty() {
            self.execute(
                "UPDATE users SET name = ?1, role = ?2, user_group = ?3, disabled = ?4, description = ?5
                 WHERE id = ?6",
                params![
                    user.name,
                    user.role,
                    user.group,
                    user.disabled,
                    user.description,
                    user.id,
                ],
                "failed to update user",
            )?
        } else {
            let hash = hash_password(&user.password)?;
            self.execute(
                "UPDATE users SET name = ?1, password = ?2, role = ?3, user_group = ?4, disabled = ?5,
                 description = ?6 WHERE id = ?7",
                params![
                    user.name,
                    hash,
                    user.role,
                    user.group,
                    user.disabled,
                    user.description,
                    user.id,
                ],
                "failed to update user",
            )?
        };
        expect_updated(rows)
    }

    fn delete_user(&self, id: i64) -> Result<()> {
        let rows = self.execute(
            "DELETE FROM users WHERE id = ?1",
            params![id],
            "failed to delete user",
        )?;
        expect_deleted(rows).map(drop)
    }

    // Group operations

    fn create_group(&self, group: &mut Group) -> Result<()> {
        require("group", &[("Name", !group.name.is_empty())], None)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO groups (name, description) VALUES (?1, ?2)",
                params![group.name, group.description],
            )
            .context("failed to add new group")?;
            group.id = conn.last_insert_rowid();
            Ok(())
        })
    }

    fn get_group(&self, id: i64) -> Result<Group> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?1"),
                params![id],
                group_from_row,
            )
            .optional()
            .context("failed to get group")?
            .ok_or(Error::NotFound)
        })
    }

    fn find_groups(&self, filter: &QueryFilter) -> Result<ListResponse<Group>> {
        self.find(&GROUP_LIST, filter, "failed to get groups list", group_from_row)
    }

    fn update_group(&self, group: &Group) -> Result<()> {
        require("group", &[("Name", !group.name.is_empty())], None)?;

        let rows = self.execute(
            "UPDATE groups SET name = ?1, description = ?2 WHERE id = ?3",
            params![group.name, group.description, group.id],
            "failed to update group",
        )?;
        expect_updated(rows)
    }

    fn delete_group(&self, id: i64) -> Result<()> {
        let rows = self.execute(
            "DELETE FROM groups WHERE id = ?1",
            params![id],
            "failed to delete group",
        )?;
        expect_deleted(rows).map(drop)
    }

    // Access operations

    fn create_access(&self, access: &mut Access) -> Result<()> {
        require(
            "access",
            &[
                ("Name", !access.name.is_empty()),
                ("Type", !access.resource_type.is_empty()),
                ("Resource name", !access.resource_name.is_empty()),
                ("Action", !access.action.is_empty()),
                ("Owner", access.owner != 0),
            ],
            None,
        )?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO access (owner_id, is_group, name, resource_type, resource_name, action, disabled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    access.owner,
                    access.is_group,
                    access.name,
                    access.resource_type,
                    access.resource_name,
                    access.action,
                    access.disabled,
                ],
            )
            .context("failed to add new access")?;
            access.id = conn.last_insert_rowid();
            Ok(())
        })
    }

    fn get_access(&self, id: i64) -> Result<Access> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {ACCESS_COLUMNS} FROM access WHERE id = ?1"),
                params![id],
                access_from_row,
            )
            .optional()
            .context("failed to get access")?
            .ok_or(Error::NotFound)
        })
    }

    fn find_access(&self, filter: &QueryFilter) -> Result<ListResponse<Access>> {
        self.find(&ACCESS_LIST, filter, "failed to get access list", access_from_row)
    }

    fn update_access(&self, access: &Access) -> Result<()> {
        let rows = self.execute(
            "UPDATE access SET owner_id = ?1, is_group = ?2, name = ?3, resource_type = ?4,
             resource_name = ?5, action = ?6, disabled = ?7 WHERE id = ?8",
            params![
                access.owner,
                access.is_group,
                access.name,
                access.resource_type,
                access.resource_name,
                access.action,
                access.disabled,
                access.id,
            ],
            "failed to update access",
        )?;
        expect_updated(rows)
    }

    fn delete_access(&self, id: i64) -> Result<()> {
        let rows = self.execute(
            "DELETE FROM access WHERE id = ?1",
            params![id],
            "failed to delete access",
        )?;
        expect_deleted(rows).map(drop)
    }

    fn delete_access_by_owner(&self, owner_id: i64, is_group: bool) -> Result<usize> {
        let rows = self.execute(
            "DELETE FROM access WHERE owner_id = ?1 AND is_group = ?2",
            params![owner_id, is_group],
            "failed to delete access by owner",
        )?;
        expect_deleted(rows)
    }

    fn access_garbage_collector(&self) -> Result<usize> {
        self.execute(
            "DELETE FROM access WHERE resource_type = 'repository' AND resource_name NOT IN
             (SELECT DISTINCT repository_name FROM repositories)",
            [],
            "failed to collect stale access",
        )
    }

    // Repository operations

    fn create_repository(&self, entry: &mut RegistryEntry) -> Result<()> {
        require(
            "repository",
            &[
                ("Repository name", !entry.repository_name.is_empty()),
                ("Tag", !entry.tag.is_empty()),
                ("Digest", !entry.digest.is_empty()),
            ],
            None,
        )?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO repositories (repository_name, tag, digest, config_digest, size,
                 pull_counter, timestamp, raw)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.repository_name,
                    entry.tag,
                    entry.digest,
                    entry.config_digest,
                    entry.size,
                    entry.pull_counter,
                    entry.timestamp,
                    entry.raw,
                ],
            )
            .context("failed to add new repository entry")?;
            entry.id = conn.last_insert_rowid();
            Ok(())
        })
    }

    fn get_repository(&self, id: i64) -> Result<RegistryEntry> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE id = ?1"),
                params![id],
                repository_from_row,
            )
            .optional()
            .context("failed to get repository entry")?
            .ok_or(Error::NotFound)
        })
    }

    fn get_repository_by_name_tag(&self, name: &str, tag: &str) -> Result<Option<RegistryEntry>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {REPOSITORY_COLUMNS} FROM repositories
                     WHERE repository_name = ?1 AND tag = ?2"
                ),
                params![name, tag],
                repository_from_row,
            )
            .optional()
            .context("failed to get repository entry")
        })
    }

    fn find_repositories(&self, filter: &QueryFilter) -> Result<ListResponse<RegistryEntry>> {
        self.find(
            &REPOSITORY_LIST,
            filter,
            "failed to get repositories list",
            repository_from_row,
        )
    }

    fn update_repository(&self, entry: &RegistryEntry) -> Result<()> {
        let rows = self.execute(
            "UPDATE repositories SET repository_name = ?1, tag = ?2, digest = ?3, config_digest = ?4,
             size = ?5, pull_counter = ?6, timestamp = ?7, raw = ?8 WHERE id = ?9",
            params![
                entry.repository_name,
                entry.tag,
                entry.digest,
                entry.config_digest,
                entry.size,
                entry.pull_counter,
                entry.timestamp,
                entry.raw,
                entry.id,
            ],
            "failed to update repository entry",
        )?;
        expect_updated(rows)
    }

    fn update_repository_fields(
        &self,
        conditions: &BTreeMap<String, Value>,
        data: &BTreeMap<String, Value>,
    ) -> Result<()> {
        if conditions.is_empty() || data.is_empty() {
            return Err(Error::Validation(
                "repository update needs both conditions and data".to_string(),
            ));
        }

        let (assignments, mut params) = column_pairs(data, ", ")?;
        let (predicate, condition_params) = column_pairs(conditions, " AND ")?;
        params.extend(condition_params);

        let sql = format!("UPDATE repositories SET {assignments} WHERE {predicate}");
        let rows = self.execute(
            &sql,
            params_from_iter(params.iter()),
            "failed to update repository entry",
        )?;
        expect_updated(rows)
    }

    fn delete_repository(&self, id: i64) -> Result<()> {
        let rows = self.execute(
            "DELETE FROM repositories WHERE id = ?1",
            params![id],
            "failed to delete repository entry",
        )?;
        expect_deleted(rows).map(drop)
    }

    fn delete_repository_by_digest(&self, digest: &str) -> Result<usize> {
        let rows = self.execute(
            "DELETE FROM repositories WHERE digest = ?1",
            params![digest],
            "failed to delete repository entry",
        )?;
        expect_deleted(rows)
    }

    fn repository_garbage_collector(&self, sync_date: i64) -> Result<usize> {
        self.execute(
            "DELETE FROM repositories WHERE timestamp < ?1",
            params![sync_date],
            "failed to collect stale repository entries",
        )
    }
}
