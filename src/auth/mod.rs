mod helpers;
mod middleware;
mod password;

pub use helpers::{CredentialError, Credentials, authenticate, parse_basic_auth};
pub use middleware::{AuthError, RequireAdmin, RequireManager, RequireUser};
pub use password::{hash_password, verify_password};
