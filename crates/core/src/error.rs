//! Unified error types for modelview.

use tokio_rusqlite::rusqlite;

/// Errors surfaced by the asset cache and its configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The storage engine could not be opened (missing directory,
    /// permissions, exhausted quota).
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A get/put/delete/scan transaction failed after open.
    #[error("storage I/O error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("storage I/O error: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid input parameters (e.g., empty token).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
