//! Embedding Client error types.

use thiserror::Error;

/// Result type for Embedding Client operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Errors that can occur while requesting embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("embedding service returned an error: {0}")]
    RequestFailed(String),

    #[error("invalid response from embedding service: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EmbeddingError {
    /// True for errors worth a caller-side retry (spec §7 `UpstreamUnavailable`).
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Unavailable(_) | EmbeddingError::Network(_))
    }
}
