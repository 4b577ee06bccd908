//! Worker error types: aggregates every adapter crate's error so `main`
//! has one type to match on during startup.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("archive error: {0}")]
    Archive(#[from] ytcorpus_archive::ArchiveError),

    #[error("blob error: {0}")]
    Blob(#[from] ytcorpus_blob::BlobError),

    #[error("index error: {0}")]
    Index(#[from] ytcorpus_index::FirestoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] ytcorpus_embeddings::EmbeddingError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] ytcorpus_pipeline::PipelineError),

    #[error("queue error: {0}")]
    Queue(#[from] ytcorpus_queue::QueueError),

    #[error("step error: {0}")]
    Step(#[from] ytcorpus_steps::StepError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
