use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;

use super::apply_patch;
use crate::auth::{RequireAdmin, RequireManager};
use crate::error::Error;
use crate::server::AppState;
use crate::server::response::{
    ApiError, ApiResponse, StoreResultExt, list_response, parse_filter,
};
use crate::types::Group;

pub async fn create_group(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(mut group): Json<Group>,
) -> impl IntoResponse {
    group.id = 0;
    state
        .store
        .create_group(&mut group)
        .api_err("Failed to create group")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

pub async fn find_groups(
    _manager: RequireManager,
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let filter = parse_filter(query.as_deref())?;
    let groups = state
        .store
        .find_groups(&filter)
        .api_err("Failed to list groups")?;

    Ok::<_, ApiError>(list_response("groups", &filter, groups))
}

pub async fn get_group(
    _manager: RequireManager,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let group = state.store.get_group(id).api_err("Failed to get group")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(group)))
}

pub async fn update_group(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<Value>,
) -> impl IntoResponse {
    let current = state.store.get_group(id).api_err("Failed to get group")?;

    let mut group = apply_patch(&current, patch)?;
    group.id = id;

    state
        .store
        .update_group(&group)
        .api_err("Failed to update group")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(group)))
}

pub async fn delete_group(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    state
        .store
        .delete_group(id)
        .api_err("Failed to delete group")?;

    match state.store.delete_access_by_owner(id, true) {
        Ok(count) => tracing::info!("Group {id} deleted with {count} access rules"),
        Err(Error::NotFound) => tracing::info!("Group {id} deleted"),
        Err(e) => {
            tracing::error!("Failed to delete access rules of group {id}: {e}");
            return Err(ApiError::internal("Failed to delete access rules of group"));
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
