//! Step-level error taxonomy (spec §7): `InvalidInput`, `NotFound`,
//! `TranscriptUnavailable`, `UpstreamUnavailable`/`RateLimited`,
//! `IntegrityError`. Every variant converts to a `String` via `Display` at
//! the point a step returns `Err(_)` to the runner (`Step::run` returns
//! `Result<Json, String>`; see `ytcorpus-pipeline::registry::Step`).

use thiserror::Error;

pub type StepResult<T> = Result<T, StepError>;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transcript unavailable: {0}")]
    TranscriptUnavailable(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("integrity error: {0}")]
    IntegrityError(String),

    #[error("archive error: {0}")]
    Archive(#[from] ytcorpus_archive::ArchiveError),

    #[error("blob error: {0}")]
    Blob(#[from] ytcorpus_blob::BlobError),

    #[error("index error: {0}")]
    Index(#[from] ytcorpus_index::FirestoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] ytcorpus_embeddings::EmbeddingError),
}

impl StepError {
    /// True for errors spec §7 classifies as transient (`UpstreamUnavailable`
    /// / `RateLimited`): the queue processor delays and the backfill engine
    /// counts the attempt as a failure but keeps the item in queue.
    pub fn is_transient(&self) -> bool {
        matches!(self, StepError::UpstreamUnavailable(_) | StepError::RateLimited(_))
    }
}

/// `Step::run` reports failures as a plain `String` (the pipeline runner's
/// contract, spec §4.5: "Uncaught exceptions are caught and recorded as
/// `StepResult.fail(\"<type>: <msg>\")`"). This carries the error kind as a
/// prefix so callers inspecting `StepResult.error` can still recover the
/// taxonomy spec §7 names.
impl From<StepError> for String {
    fn from(err: StepError) -> Self {
        let kind = match &err {
            StepError::InvalidInput(_) => "InvalidInput",
            StepError::NotFound(_) => "NotFound",
            StepError::TranscriptUnavailable(_) => "TranscriptUnavailable",
            StepError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            StepError::RateLimited(_) => "RateLimited",
            StepError::IntegrityError(_) => "IntegrityError",
            StepError::Archive(_) => "ArchiveError",
            StepError::Blob(_) => "BlobError",
            StepError::Index(_) => "IndexError",
            StepError::Embedding(_) => "EmbeddingError",
        };
        format!("{kind}: {err}")
    }
}
