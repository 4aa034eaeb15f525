use crate::server::response::ApiError;
use crate::types::Access;

const RESOURCE_TYPES: [&str; 2] = ["repository", "registry"];
const ACTIONS: [&str; 4] = ["pull", "push", "delete", "*"];

fn is_action_separator(c: char) -> bool {
    c == ':' || c == ',' || c.is_whitespace()
}

fn validate_resource_type(resource_type: &str) -> Result<(), String> {
    if RESOURCE_TYPES.contains(&resource_type) {
        return Ok(());
    }
    Err(format!(
        "Resource type '{resource_type}' is not one of: {}",
        RESOURCE_TYPES.join(", ")
    ))
}

fn validate_actions(action: &str) -> Result<(), String> {
    let unknown = action
        .split(is_action_separator)
        .filter(|a| !a.is_empty() && !ACTIONS.contains(a))
        .collect::<Vec<_>>();
    if unknown.is_empty() {
        return Ok(());
    }
    Err(format!("Unknown actions: {}", unknown.join(", ")))
}

/// Checks the parts of an access rule the registry interprets. Missing fields
/// are left to the store, which reports all of them at once.
pub fn validate_access(access: &Access) -> Result<(), ApiError> {
    if !access.resource_type.is_empty() {
        validate_resource_type(&access.resource_type).map_err(ApiError::bad_request)?;
    }
    validate_actions(&access.action).map_err(ApiError::bad_request)
}
