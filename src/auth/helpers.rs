use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::verify_password;
use crate::error::Error;
use crate::store::Store;
use crate::types::{User, UserLookup};

#[derive(Debug)]
pub enum CredentialError {
    InvalidScheme,
    InvalidCredentials,
    Disabled,
    InternalError,
}

/// Login and password taken from a Basic authorization header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// Parses `Basic base64(login:password)`.
pub fn parse_basic_auth(header: &str) -> Result<Credentials, CredentialError> {
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or(CredentialError::InvalidScheme)?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| CredentialError::InvalidCredentials)?;
    let credentials = String::from_utf8(decoded).map_err(|_| CredentialError::InvalidCredentials)?;

    let (login, password) = credentials
        .split_once(':')
        .ok_or(CredentialError::InvalidCredentials)?;
    if login.is_empty() {
        return Err(CredentialError::InvalidCredentials);
    }

    Ok(Credentials {
        login: login.to_string(),
        password: password.to_string(),
    })
}

/// Checks credentials against the stored user. The returned user carries no
/// password hash.
pub fn authenticate(store: &dyn Store, credentials: &Credentials) -> Result<User, CredentialError> {
    let lookup = UserLookup::Login(credentials.login.clone());
    let mut user = match store.get_user(&lookup) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(CredentialError::InvalidCredentials),
        Err(e) => {
            tracing::error!("Failed to load user '{}': {e}", credentials.login);
            return Err(CredentialError::InternalError);
        }
    };

    if !verify_password(&user.password, &credentials.password) {
        return Err(CredentialError::InvalidCredentials);
    }
    if user.disabled {
        return Err(CredentialError::Disabled);
    }

    user.password.clear();
    Ok(user)
}
