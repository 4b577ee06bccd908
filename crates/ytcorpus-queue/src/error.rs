//! Queue Processor error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not resolve a video id from url {0}: {1}")]
    InvalidUrl(String, String),

    #[error("file {0} was claimed by another worker before it could be moved to processing/")]
    AlreadyClaimed(String),
}
