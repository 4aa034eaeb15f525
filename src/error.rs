use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A statement failed; `context` names the operation that issued it.
    #[error("{context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("record not found")]
    NotFound,

    #[error("record didn't update")]
    NotUpdated,

    #[error("{0}")]
    Validation(String),

    #[error("connection to store is closed")]
    ConnectionClosed,

    #[error("store file {0} was not created")]
    StoreMissing(PathBuf),

    #[error("failed to initialize tables: {0}")]
    Bootstrap(String),

    #[error("password hash error: {0}")]
    PasswordHash(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// Reports whether the error came from a storage constraint (unique, not null).
    #[must_use]
    pub fn is_constraint(&self) -> bool {
        let source = match self {
            Error::Database(e) | Error::Query { source: e, .. } => e,
            _ => return false,
        };
        matches!(
            source,
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attaches a short operation prefix to rusqlite results.
pub(crate) trait QueryContext<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> QueryContext<T> for std::result::Result<T, rusqlite::Error> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|source| Error::Query { context, source })
    }
}
