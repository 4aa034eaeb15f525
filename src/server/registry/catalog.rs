use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{RequireAdmin, RequireManager, RequireUser};
use crate::server::AppState;
use crate::server::response::{
    ApiError, ApiResponse, StoreResultExt, list_response, parse_filter,
};
use crate::store::REPOSITORIES_BY_USER_ACCESS;
use crate::types::Role;

/// Listings are grouped by repository name unless `group_by=none` is given.
/// Names and values are compared after form decoding.
fn grouping_requested(query: Option<&str>) -> bool {
    !query
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .any(|(name, value)| {
            decode_component(name).as_deref() == Some("group_by")
                && decode_component(value).as_deref() == Some("none")
        })
}

fn decode_component(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(|decoded| decoded.into_owned())
}

pub async fn list_catalog(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let mut filter = parse_filter(query.as_deref())?;
    filter.group_by_field = grouping_requested(query.as_deref());

    // Plain users only see repositories granted to them.
    if !matches!(user.role(), Some(Role::Admin | Role::Manager)) {
        filter
            .filters
            .insert(REPOSITORIES_BY_USER_ACCESS.to_string(), json!(user.id));
    }

    let entries = state
        .store
        .find_repositories(&filter)
        .api_err("Failed to list repositories")?;

    Ok::<_, ApiError>(list_response("registry/catalog", &filter, entries))
}

pub async fn get_entry(
    _manager: RequireManager,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let entry = state
        .store
        .get_repository(id)
        .api_err("Failed to get repository entry")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(entry)))
}

pub async fn delete_entry(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    state
        .store
        .delete_repository(id)
        .api_err("Failed to delete repository entry")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct GarbageRequest {
    /// Entries last pushed before this unix timestamp are removed.
    pub sync_date: i64,
}

#[derive(Debug, Serialize)]
pub struct GarbageResponse {
    pub repositories: usize,
    pub access: usize,
}

/// Drops repository entries older than `sync_date`, then the repository
/// access rules left without an entry.
pub async fn collect_garbage(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<GarbageRequest>,
) -> impl IntoResponse {
    let repositories = state
        .store
        .repository_garbage_collector(req.sync_date)
        .api_err("Failed to collect repository entries")?;
    let access = state
        .store
        .access_garbage_collector()
        .api_err("Failed to collect access rules")?;

    tracing::info!("Garbage collected: {repositories} repository entries, {access} access rules");

    Ok::<_, ApiError>(Json(ApiResponse::success(GarbageResponse {
        repositories,
        access,
    })))
}
