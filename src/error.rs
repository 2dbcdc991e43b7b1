use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("duplicate key")]
    Duplicate,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("text index required on collection '{0}'")]
    MissingTextIndex(String),

    #[error("stored blob {0} failed checksum verification")]
    Corrupt(String),

    #[error("store is not connected")]
    NotConnected,

    #[error("store provider is not initialized")]
    NotInitialized,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token format")]
    InvalidTokenFormat,
}

impl Error {
    /// Maps a SQLite constraint failure to `Duplicate`, everything else to `Database`.
    pub(crate) fn from_write(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Duplicate
            }
            e => Error::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
