mod access;
mod groups;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::server::AppState;
use crate::server::response::ApiError;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // User routes
        .route("/users", post(users::create_user))
        .route("/users", get(users::find_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        // Group routes
        .route("/groups", post(groups::create_group))
        .route("/groups", get(groups::find_groups))
        .route("/groups/{id}", get(groups::get_group))
        .route("/groups/{id}", put(groups::update_group))
        .route("/groups/{id}", delete(groups::delete_group))
        // Access routes
        .route("/access", post(access::create_access))
        .route("/access", get(access::find_access))
        .route("/access/{id}", get(access::get_access))
        .route("/access/{id}", put(access::update_access))
        .route("/access/{id}", delete(access::delete_access))
}

/// Overlays the fields present in `patch` onto `current`.
fn apply_patch<T: Serialize + DeserializeOwned>(current: &T, patch: Value) -> Result<T, ApiError> {
    let Value::Object(patch) = patch else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };
    let mut merged = serde_json::to_value(current)
        .map_err(|_| ApiError::internal("Failed to encode current record"))?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(patch);
    }
    serde_json::from_value(merged).map_err(|e| ApiError::bad_request(format!("Invalid body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Group;
    use serde_json::json;

    #[test]
    fn test_apply_patch_keeps_missing_fields() {
        let group = Group {
            id: 3,
            name: "devs".to_string(),
            description: "developers".to_string(),
        };
        let patched = apply_patch(&group, json!({"description": "backend"})).unwrap();
        assert_eq!(patched.id, 3);
        assert_eq!(patched.name, "devs");
        assert_eq!(patched.description, "backend");
    }

    #[test]
    fn test_apply_patch_rejects_non_objects() {
        let group = Group::default();
        assert!(apply_patch(&group, json!([1, 2])).is_err());
        assert!(apply_patch(&group, json!({"name": 5})).is_err());
    }
}
