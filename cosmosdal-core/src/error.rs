//! Error types and result types for data access operations.
//!
//! The store client reports every failure as a [`StoreError`] carrying a numeric status code
//! and a message. Each manager translates the failures it catches into its own error kind:
//!
//! - [`DatabaseError`] for [`DatabaseManager`](crate::manager::DatabaseManager) operations
//! - [`CollectionError`] for [`CollectionManager`](crate::manager::CollectionManager) operations
//! - [`DocumentError`] for [`DocumentManager`](crate::manager::DocumentManager) operations and
//!   document pagination
//!
//! The kind depends on which manager caught the failure, never on the status code. Callers
//! that need to tell a conflict from a missing resource inspect `status_code` themselves.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Status codes used by the store and by failures raised inside this layer.
pub mod status {
    /// The request was malformed or violated a store rule.
    pub const BAD_REQUEST: u16 = 400;
    /// The addressed resource does not exist.
    pub const NOT_FOUND: u16 = 404;
    /// A resource with the same id (or unique key) already exists.
    pub const CONFLICT: u16 = 409;
    /// The store returned a record this layer could not decode.
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}

/// The single failure kind reported by a store client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Store request failed with status {status_code}: {message}")]
pub struct StoreError {
    /// The numeric status code of the failed request.
    pub status_code: u16,
    /// The message reported alongside the status code.
    pub message: String,
}

impl StoreError {
    /// Creates a store error from a status code and a message.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a 400 error for a malformed or rejected request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(status::BAD_REQUEST, message)
    }

    /// Creates a 404 error for a missing resource.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(status::NOT_FOUND, message)
    }

    /// Creates a 409 error for a resource that already exists.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(status::CONFLICT, message)
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::bad_request(err.to_string())
    }
}

/// A specialized `Result` type for store client operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A failure caught by the database manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Database error ({status_code}): {message}")]
pub struct DatabaseError {
    pub status_code: u16,
    pub message: String,
}

impl From<StoreError> for DatabaseError {
    fn from(err: StoreError) -> Self {
        Self {
            status_code: err.status_code,
            message: err.message,
        }
    }
}

/// A failure caught by the collection manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Collection error ({status_code}): {message}")]
pub struct CollectionError {
    pub status_code: u16,
    pub message: String,
}

impl From<StoreError> for CollectionError {
    fn from(err: StoreError) -> Self {
        Self {
            status_code: err.status_code,
            message: err.message,
        }
    }
}

/// A failure caught by the document manager or while paginating document results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Document error ({status_code}): {message}")]
pub struct DocumentError {
    pub status_code: u16,
    pub message: String,
}

impl From<StoreError> for DocumentError {
    fn from(err: StoreError) -> Self {
        Self {
            status_code: err.status_code,
            message: err.message,
        }
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
pub type CollectionResult<T> = Result<T, CollectionError>;
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Any error raised by a manager.
///
/// Useful for callers that handle every resource level in one place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CosmosDalError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl CosmosDalError {
    /// Returns the status code of the underlying failure.
    pub fn status_code(&self) -> u16 {
        match self {
            CosmosDalError::Database(err) => err.status_code,
            CosmosDalError::Collection(err) => err.status_code,
            CosmosDalError::Document(err) => err.status_code,
        }
    }

    /// Returns the message of the underlying failure.
    pub fn message(&self) -> &str {
        match self {
            CosmosDalError::Database(err) => &err.message,
            CosmosDalError::Collection(err) => &err.message,
            CosmosDalError::Document(err) => &err.message,
        }
    }
}
