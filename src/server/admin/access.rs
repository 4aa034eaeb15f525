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
use crate::server::AppState;
use crate::server::response::{
    ApiError, ApiResponse, StoreResultExt, list_response, parse_filter,
};
use crate::server::validation::validate_access;
use crate::types::Access;

pub async fn create_access(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(mut access): Json<Access>,
) -> impl IntoResponse {
    validate_access(&access)?;

    access.id = 0;
    state
        .store
        .create_access(&mut access)
        .api_err("Failed to create access")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(access))))
}

pub async fn find_access(
    _manager: RequireManager,
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let filter = parse_filter(query.as_deref())?;
    let rules = state
        .store
        .find_access(&filter)
        .api_err("Failed to list access")?;

    Ok::<_, ApiError>(list_response("access", &filter, rules))
}

pub async fn get_access(
    _manager: RequireManager,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let access = state.store.get_access(id).api_err("Failed to get access")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(access)))
}

pub async fn update_access(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<Value>,
) -> impl IntoResponse {
    let current = state.store.get_access(id).api_err("Failed to get access")?;

    let mut access = apply_patch(&current, patch)?;
    access.id = id;
    validate_access(&access)?;

    state
        .store
        .update_access(&access)
        .api_err("Failed to update access")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(access)))
}

pub async fn delete_access(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    state
        .store
        .delete_access(id)
        .api_err("Failed to delete access")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
