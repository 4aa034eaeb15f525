//! Query filters and their compilation into statement fragments.
//!
//! A [`QueryFilter`] compiles into four fragments joined in a fixed order:
//! the id list (`IN`), the full-text search (`LIKE` alternatives), the exact
//! matches (`=` conjunction) and the ordering/pagination tail. Column names
//! come from sanitized filter keys; every value is bound as a parameter.

use std::collections::BTreeMap;

use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use serde_json::Value;

use super::sanitize::{sanitize_identifier, sanitize_key_value};
use crate::error::{Error, Result};

/// Filter key holding the full-text search string.
pub const QUERY_KEY: &str = "q";

/// Filter key holding a list of record ids.
pub const IDS_KEY: &str = "ids";

/// Filter key that restricts repository listings to the ones granted to an
/// owner. Its presence joins the `access` table into the query.
pub const REPOSITORIES_BY_USER_ACCESS: &str = "access.owner_id";

const DEFAULT_SORT_FIELD: &str = "id";

/// Client-supplied description of which rows to match, sort by and paginate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    /// `[skip, end)` where `end == 0` means "no limit".
    pub range: [i64; 2],
    /// Ids already extracted from the request; used when `filters` has no `ids` key.
    pub ids: Vec<i64>,
    /// `q` is full-text search, `ids` an id list, anything else an exact match.
    pub filters: BTreeMap<String, Value>,
    /// Sort field and direction; defaults to `id ASC`.
    pub sort: Option<(String, String)>,
    /// Deduplicate rows on the first searchable field of the collection.
    pub group_by_field: bool,
}

impl QueryFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_range(mut self, start: i64, end: i64) -> Self {
        self.range = [start, end];
        self
    }

    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort = Some((field.into(), direction.into()));
        self
    }

    #[must_use]
    pub fn grouped(mut self) -> Self {
        self.group_by_field = true;
        self
    }

    /// Returns true when the filter restricts repositories to an access owner.
    #[must_use]
    pub fn by_user_access(&self) -> bool {
        self.filters.contains_key(REPOSITORIES_BY_USER_ACCESS)
    }

    /// Builds a filter from a raw URL query string.
    ///
    /// Recognized parameters are `filter` (JSON object), `range` (JSON
    /// `[start, end]`, end inclusive) and `sort` (JSON `[field, direction]`).
    /// `range` and `sort` are honored only when both are present.
    pub fn from_query_string(query: &str) -> Result<Self> {
        let mut filter = None;
        let mut range = None;
        let mut sort = None;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(&value.replace('+', " "))
                .map_err(|e| Error::BadRequest(format!("invalid query encoding: {e}")))?
                .into_owned();
            match name {
                "filter" => filter = Some(value),
                "range" => range = Some(value),
                "sort" => sort = Some(value),
                _ => {}
            }
        }

        Self::from_params(filter.as_deref(), range.as_deref(), sort.as_deref())
    }

    /// Builds a filter from the already-decoded `filter`, `range` and `sort` parameters.
    pub fn from_params(filter: Option<&str>, range: Option<&str>, sort: Option<&str>) -> Result<Self> {
        let mut result = QueryFilter::default();

        if let Some(filter) = filter {
            let mut filters: BTreeMap<String, Value> = serde_json::from_str(filter)
                .map_err(|e| Error::BadRequest(format!("invalid filter: {e}")))?;
            if let Some(ids) = filters.remove(IDS_KEY) {
                result.ids = parse_ids(&ids)?;
            }
            result.filters = filters;
        }

        if let (Some(range), Some(sort)) = (range, sort) {
            let [start, end]: [i64; 2] = serde_json::from_str(range)
                .map_err(|e| Error::BadRequest(format!("invalid range: {e}")))?;
            if start < 0 || end < start {
                return Err(Error::BadRequest(format!("invalid range: [{start}, {end}]")));
            }
            // UI ranges are inclusive, pagination end is exclusive.
            let end = end
                .checked_add(1)
                .ok_or_else(|| Error::BadRequest(format!("range end {end} is too large")))?;
            result.range = [start, end];

            let sort: Vec<String> = serde_json::from_str(sort)
                .map_err(|e| Error::BadRequest(format!("invalid sort: {e}")))?;
            match sort.as_slice() {
                [field, direction, ..] => result.sort = Some((field.clone(), direction.clone())),
                _ => return Err(Error::BadRequest("sort must name a field and a direction".into())),
            }
        }

        Ok(result)
    }
}

fn parse_ids(value: &Value) -> Result<Vec<i64>> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .ok_or_else(|| Error::BadRequest(format!("invalid id: {n}"))),
            Value::String(s) => s
                .parse()
                .map_err(|_| Error::BadRequest(format!("invalid id: {s}"))),
            other => Err(Error::BadRequest(format!("invalid id: {other}"))),
        })
        .collect()
}

/// Result of a `find` call: the total number of matching rows ignoring the
/// range, and the rows of the requested page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResponse<T> {
    pub total: i64,
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total: 0,
            data: Vec::new(),
        }
    }
}

/// A filter compiled against one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CompiledFilter {
    /// `WHERE ...` or empty.
    pub where_clause: String,
    /// ` GROUP BY ...` or empty.
    pub group_by: String,
    pub order_by: String,
    /// ` LIMIT n OFFSET m` or empty.
    pub limit: String,
    /// Parameters for the placeholders of `where_clause`, in order.
    pub params: Vec<SqlValue>,
}

impl CompiledFilter {
    pub fn all_clauses(&self) -> String {
        format!(
            "{}{}{}{}",
            self.where_clause, self.group_by, self.order_by, self.limit
        )
    }
}

/// Compiles `filter` for `table`, whose full-text searchable columns are
/// `fields`. The first field is also the grouping column.
///
/// Fails when a key or the sort field is not a column name once sanitized.
pub(crate) fn compile(filter: &QueryFilter, table: &str, fields: &[&str]) -> Result<CompiledFilter> {
    let mut ids: Option<Vec<SqlValue>> = None;
    let mut like: Option<(String, Vec<SqlValue>)> = None;
    let mut exact: Vec<String> = Vec::new();
    let mut exact_params: Vec<SqlValue> = Vec::new();

    for (raw_key, raw_value) in &filter.filters {
        let (key, value) = sanitize_key_value(raw_key, raw_value);
        match key.as_str() {
            "" => {}
            IDS_KEY => ids = Some(id_list(&value)),
            QUERY_KEY => like = full_text(&value, fields),
            _ => {
                if !is_identifier(&key) {
                    return Err(Error::BadRequest(format!("invalid filter field '{raw_key}'")));
                }
                if let Some(bound) = bind_value(&value) {
                    exact.push(format!("{} = ?", column(&key, table)));
                    exact_params.push(bound);
                }
            }
        }
    }

    if ids.is_none() && !filter.ids.is_empty() {
        ids = Some(filter.ids.iter().map(|id| SqlValue::Integer(*id)).collect());
    }

    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(ids) = ids {
        let placeholders = vec!["?"; ids.len()].join(", ");
        conditions.push(format!("{}.id IN ({placeholders})", table));
        params.extend(ids);
    }
    if let Some((clause, like_params)) = like {
        conditions.push(format!("({clause})"));
        params.extend(like_params);
    }
    if !exact.is_empty() {
        conditions.push(format!("({})", exact.join(" AND ")));
        params.extend(exact_params);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let group_by = match fields.first() {
        Some(field) if filter.group_by_field => format!(" GROUP BY {field}"),
        _ => String::new(),
    };

    Ok(CompiledFilter {
        where_clause,
        group_by,
        order_by: order_by(filter, table)?,
        limit: limit(filter.range),
        params,
    })
}

/// Renders `key = ?` pairs joined by `separator`, for partial updates where
/// the map names both the columns to set and the rows to match. Keys are
/// scrubbed, values are bound untouched and null binds as NULL.
pub(crate) fn column_pairs(
    map: &BTreeMap<String, Value>,
    separator: &str,
) -> Result<(String, Vec<SqlValue>)> {
    let mut pairs = Vec::with_capacity(map.len());
    let mut params = Vec::with_capacity(map.len());
    for (raw_key, raw_value) in map {
        let key = sanitize_identifier(raw_key);
        if !is_identifier(&key) || key.contains('.') {
            return Err(Error::Validation(format!("invalid field '{raw_key}'")));
        }
        pairs.push(format!("{key} = ?"));
        params.push(bind_value(raw_value).unwrap_or(SqlValue::Null));
    }
    Ok((pairs.join(separator), params))
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn id_list(value: &Value) -> Vec<SqlValue> {
    match value {
        Value::Array(items) => items.iter().filter_map(bind_value).collect(),
        other => bind_value(other).into_iter().collect(),
    }
}

/// `field1 LIKE ? OR field2 LIKE ? ...`; strings match as substrings,
/// numbers are compared as is.
fn full_text(value: &Value, fields: &[&str]) -> Option<(String, Vec<SqlValue>)> {
    if fields.is_empty() {
        return None;
    }
    let pattern = match value {
        Value::String(s) => SqlValue::Text(format!("%{s}%")),
        other => bind_value(other)?,
    };
    let clause = fields
        .iter()
        .map(|field| format!("{field} LIKE ?"))
        .collect::<Vec<_>>()
        .join(" OR ");
    Some((clause, vec![pattern; fields.len()]))
}

/// Converts a JSON filter value into a bound parameter. Floats lose their
/// fraction, lists contribute their first element, null and objects nothing.
fn bind_value(value: &Value) -> Option<SqlValue> {
    match value {
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(SqlValue::Integer),
        Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        Value::Array(items) => items.first().and_then(bind_value),
        Value::Null | Value::Object(_) => None,
    }
}

/// Qualifies `id` with the table so joined queries stay unambiguous.
fn column(key: &str, table: &str) -> String {
    if key == "id" {
        format!("{table}.id")
    } else {
        key.to_string()
    }
}

fn order_by(filter: &QueryFilter, table: &str) -> Result<String> {
    let (field, direction) = match &filter.sort {
        Some((field, direction)) => (sanitize_identifier(field), direction.as_str()),
        None => (String::new(), "asc"),
    };
    let field = if field.is_empty() {
        DEFAULT_SORT_FIELD.to_string()
    } else if is_identifier(&field) {
        field
    } else {
        return Err(Error::BadRequest(format!("invalid sort field '{field}'")));
    };
    let direction = if direction.eq_ignore_ascii_case("desc") {
        "DESC"
    } else {
        "ASC"
    };
    Ok(format!(" ORDER BY {} {direction}", column(&field, table)))
}

fn limit(range: [i64; 2]) -> String {
    let start = range[0].max(0);
    let end = range[1];
    if end > 0 {
        format!(" LIMIT {} OFFSET {start}", (end - start).max(0))
    } else if start > 0 {
        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
        format!(" LIMIT -1 OFFSET {start}")
    } else {
        String::new()
    }
}
