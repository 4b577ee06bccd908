//! Archive Store error types.

use thiserror::Error;

/// Result type for Archive Store operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors that can occur during Archive Store operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("video record not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("integrity error: {0}")]
    IntegrityError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ArchiveError {
    pub fn not_found(video_id: impl Into<String>) -> Self {
        Self::NotFound(video_id.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::IntegrityError(msg.into())
    }

    /// True for errors that surface without being retried by the caller
    /// (spec §7: `NotFound` is "surfaced; callers decide").
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound(_))
    }
}
