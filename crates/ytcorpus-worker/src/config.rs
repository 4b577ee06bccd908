//! Worker configuration: the knobs that sit above the adapter crates,
//! each of which loads its own `from_env()` (archive, blob, index,
//! embeddings, transcript/metadata/LLM clients). This crate only owns the
//! scheduling cadence for the Queue Processor and the Backfill Engine.

use std::time::Duration;

/// Which `BlobStore` implementation `main` should construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBackend {
    Local,
    S3,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// `BLOB_BACKEND`: `"local"` (default) or `"s3"`.
    pub blob_backend: BlobBackend,
    /// `BLOB_LOCAL_ROOT`, used when `blob_backend` is `Local`.
    pub blob_local_root: String,
    /// `BACKFILL_BATCH_SIZE` (spec §6): videos re-run per step per backfill tick.
    pub backfill_batch_size: usize,
    /// `BACKFILL_INTERVAL_SECONDS`: how often the backfill scheduler runs
    /// `run_backfill_all` over every registered step.
    pub backfill_interval: Duration,
    /// `EMBEDDING_MODEL` (spec §6), threaded through to `embed_chunks` and
    /// `update_graph`.
    pub embedding_model: String,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let blob_backend = match std::env::var("BLOB_BACKEND").ok().as_deref() {
            Some("s3") => BlobBackend::S3,
            _ => BlobBackend::Local,
        };
        let blob_local_root = std::env::var("BLOB_LOCAL_ROOT").unwrap_or_else(|_| "./data/blob".to_string());
        let backfill_batch_size = std::env::var("BACKFILL_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50);
        let backfill_interval = std::env::var("BACKFILL_INTERVAL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(3600));
        let embedding_model = std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "bge-small-en".to_string());

        Self { blob_backend, blob_local_root, backfill_batch_size, backfill_interval, embedding_model }
    }
}
