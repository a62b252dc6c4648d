//! Unified error types for warden.
//!
//! Display strings carry a stable upper-case code prefix so callers on the
//! tool surface can match on them.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the warden proxy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The network fetch was rejected (offline, DNS failure, timeout, refused redirect).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// The cache store refused an operation (e.g. a partial response).
    #[error("CACHE_ERROR: {0}")]
    CacheStore(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A manifest URL could not be fetched during installation.
    #[error("BULK_POPULATE_FAILED: {url}: {reason}")]
    BulkPopulate { url: String, reason: String },

    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),
}

impl Error {
    /// Whether this error came from the network capability rather than the store.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTooLarge(_))
    }
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

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CacheStore(format!("corrupt entry: {err}"))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::CacheMiss(_) => -32001,
            Error::CacheStore(_) | Error::Database(_) | Error::MigrationFailed(_) => -32002,
            Error::InvalidUrl(_) => -32003,
            Error::Network(_) => -32004,
            Error::FetchTooLarge(_) => -32005,
            Error::BulkPopulate { .. } => -32006,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
