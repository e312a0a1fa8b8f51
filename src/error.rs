//! Error types
//!
//! Every catalog operation returns a [`CatalogError`] whose [`ErrorKind`] tells
//! a transport layer how to report it (404/409/400/500 for HTTP) without the
//! core knowing anything about that transport.

use thiserror::Error;

use crate::storage::StoreError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Error type for catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No entry or resource with the given id
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate entry id or resource id
    #[error("conflict: {0}")]
    Conflict(String),

    /// Failed validation or invalid pagination/filter parameters
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Failure in the underlying ordered store
    #[error("storage error: {0}")]
    Storage(StoreError),

    /// A stored document could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The notification hub is no longer running
    #[error("notification hub stopped")]
    HubClosed,

    /// Filesystem error while preparing a data directory
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`CatalogError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Internal,
}

impl CatalogError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::Conflict(_) => ErrorKind::Conflict,
            CatalogError::BadRequest(_) => ErrorKind::BadRequest,
            CatalogError::Storage(_)
            | CatalogError::Serialization(_)
            | CatalogError::HubClosed
            | CatalogError::Io(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(what: &str, id: &str) -> Self {
        CatalogError::NotFound(format!("{} {}", what, id))
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => CatalogError::NotFound(key),
            other => CatalogError::Storage(other),
        }
    }
}
