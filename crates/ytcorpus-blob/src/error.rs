//! Blob Store error types.

use thiserror::Error;

/// Result type for Blob Store operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during Blob Store operations.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("failed to configure blob client: {0}")]
    ConfigError(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("put failed: {0}")]
    PutFailed(String),

    #[error("get failed: {0}")]
    GetFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("list failed: {0}")]
    ListFailed(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("object store error: {0}")]
    Backend(String),
}

impl BlobError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn put_failed(msg: impl Into<String>) -> Self {
        Self::PutFailed(msg.into())
    }

    pub fn get_failed(msg: impl Into<String>) -> Self {
        Self::GetFailed(msg.into())
    }

    pub fn delete_failed(msg: impl Into<String>) -> Self {
        Self::DeleteFailed(msg.into())
    }

    pub fn list_failed(msg: impl Into<String>) -> Self {
        Self::ListFailed(msg.into())
    }

    /// True for keys absent from the store (spec §4.2: "the core treats
    /// absence as first write").
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_))
    }
}
