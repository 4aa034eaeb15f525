use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{CredentialError, authenticate, parse_basic_auth};
use crate::server::AppState;
use crate::types::{Role, User};

/// Extractor that requires any enabled, authenticated user
pub struct RequireUser(pub User);

/// Extractor that requires a user with the admin role
pub struct RequireAdmin(pub User);

/// Extractor that requires an admin or a manager
pub struct RequireManager(pub User);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidCredentials,
    Disabled,
    NotAdmin,
    NotManager,
    InternalError,
}

impl From<CredentialError> for AuthError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::InvalidScheme => AuthError::InvalidScheme,
            CredentialError::InvalidCredentials => AuthError::InvalidCredentials,
            CredentialError::Disabled => AuthError::Disabled,
            CredentialError::InternalError => AuthError::InternalError,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid login or password"),
            AuthError::Disabled => (StatusCode::FORBIDDEN, "User is disabled"),
            AuthError::NotAdmin => (StatusCode::FORBIDDEN, "Admin access required"),
            AuthError::NotManager => (StatusCode::FORBIDDEN, "Manager access required"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"registry-admin\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = extract_and_authenticate(parts, state)?;
        Ok(RequireUser(user))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = extract_and_authenticate(parts, state)?;

        if user.role() != Some(Role::Admin) {
            return Err(AuthError::NotAdmin);
        }

        Ok(RequireAdmin(user))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireManager {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = extract_and_authenticate(parts, state)?;

        match user.role() {
            Some(Role::Admin | Role::Manager) => Ok(RequireManager(user)),
            _ => Err(AuthError::NotManager),
        }
    }
}

fn extract_and_authenticate(parts: &Parts, state: &Arc<AppState>) -> Result<User, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    let credentials = parse_basic_auth(header)?;
    Ok(authenticate(state.store.as_ref(), &credentials)?)
}
