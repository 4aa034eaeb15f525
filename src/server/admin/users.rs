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
use crate::types::{User, UserLookup};

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(mut user): Json<User>,
) -> impl IntoResponse {
    user.id = 0;
    state
        .store
        .create_user(&mut user)
        .api_err("Failed to create user")?;

    tracing::info!("User '{}' created with id {}", user.login, user.id);
    user.password.clear();
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn find_users(
    _manager: RequireManager,
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let filter = parse_filter(query.as_deref())?;
    let users = state
        .store
        .find_users(&filter)
        .api_err("Failed to list users")?;

    Ok::<_, ApiError>(list_response("users", &filter, users))
}

/// `id` is a numeric id or a login.
pub async fn get_user(
    _manager: RequireManager,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut user = state
        .store
        .get_user(&UserLookup::parse(&id))
        .api_err("Failed to get user")?;

    user.password.clear();
    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn update_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<Value>,
) -> impl IntoResponse {
    let mut current = state
        .store
        .get_user(&UserLookup::Id(id))
        .api_err("Failed to get user")?;
    // A password only reaches the store when the request carries one.
    current.password.clear();

    let mut user = apply_patch(&current, patch)?;
    user.id = id;
    user.login = current.login;

    state
        .store
        .update_user(&user)
        .api_err("Failed to update user")?;

    user.password.clear();
    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    if admin.id == id {
        return Err(ApiError::bad_request("Cannot delete the current user"));
    }

    state
        .store
        .delete_user(id)
        .api_err("Failed to delete user")?;

    match state.store.delete_access_by_owner(id, false) {
        Ok(count) => tracing::info!("User {id} deleted with {count} access rules"),
        Err(Error::NotFound) => tracing::info!("User {id} deleted"),
        Err(e) => {
            tracing::error!("Failed to delete access rules of user {id}: {e}");
            return Err(ApiError::internal("Failed to delete access rules of user"));
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
