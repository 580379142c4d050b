//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// No history or aggregate exists for the requested endpoint
    NotFound(String),

    /// The backend was closed and can no longer serve requests
    Closed,

    /// Opening the database file failed
    ConnectionFailed(String),

    /// A read or write transaction could not be started or committed
    TransactionFailed(String),

    /// Invalid configuration
    InvalidConfig(String),

    /// Record serialization/deserialization error
    SerializationError(String),

    /// Backend-specific error
    BackendError(String),

    /// I/O error (file access, etc.)
    IoError(std::io::Error),
}

impl StorageError {
    /// Whether this error signals a missing endpoint rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(what) => write!(f, "{} not exists", what),
            StorageError::Closed => write!(f, "storage backend is closed"),
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to open storage backend: {}", msg)
            }
            StorageError::TransactionFailed(msg) => write!(f, "storage transaction failed: {}", msg),
            StorageError::InvalidConfig(msg) => write!(f, "invalid storage configuration: {}", msg),
            StorageError::SerializationError(msg) => {
                write!(f, "record serialization error: {}", msg)
            }
            StorageError::BackendError(msg) => write!(f, "storage backend error: {}", msg),
            StorageError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::BackendError(format!("storage task failed: {}", err))
    }
}

// redb error conversions (used in redb.rs)
impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::ConnectionFailed(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::TransactionFailed(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::TransactionFailed(err.to_string())
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        match err {
            redb::TableError::TableDoesNotExist(name) => StorageError::NotFound(name),
            redb::TableError::Storage(err) => err.into(),
            _ => StorageError::BackendError(err.to_string()),
        }
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        match err {
            redb::StorageError::Io(io_err) => StorageError::IoError(io_err),
            _ => StorageError::BackendError(err.to_string()),
        }
    }
}
