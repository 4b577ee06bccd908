//! Ingestion worker binary: wires the Queue Processor and a periodic
//! Backfill scheduler over a shared `StepRegistry` and `ArchiveStore`,
//! behind one shutdown channel (spec components C8, C9).

use std::sync::Arc;

use tracing::{error, info, warn};
use ytcorpus_archive::{ArchiveConfig, ArchiveStore};
use ytcorpus_blob::{BlobStore, LocalBlobStore, S3BlobStore};
use ytcorpus_embeddings::HttpEmbeddingClient;
use ytcorpus_index::{FirestoreClient, FirestoreIndexStore, IndexStore};
use ytcorpus_pipeline::{run_backfill_all, StepRegistry};
use ytcorpus_queue::{QueueConfig, QueueProcessor};
use ytcorpus_steps::{register_default_steps, HttpLlmClient, HttpTranscriptFetcher, StepDeps, YoutubeMetadataFetcher};
use ytcorpus_worker::{init_tracing, BlobBackend, WorkerConfig, WorkerError, WorkerResult};

async fn build_blob_store(config: &WorkerConfig) -> WorkerResult<Arc<dyn BlobStore>> {
    Ok(match config.blob_backend {
        BlobBackend::Local => Arc::new(LocalBlobStore::new(&config.blob_local_root)),
        BlobBackend::S3 => Arc::new(S3BlobStore::from_env().await?),
    })
}

async fn build_registry(
    archive: Arc<ArchiveStore>,
    blob: Arc<dyn BlobStore>,
    index: Arc<dyn IndexStore>,
    embedding_model: String,
) -> WorkerResult<StepRegistry> {
    let embeddings = Arc::new(HttpEmbeddingClient::from_env()?);
    let transcript_fetcher = Arc::new(HttpTranscriptFetcher::from_env());
    let metadata_fetcher = Arc::new(YoutubeMetadataFetcher::from_env()?);
    let llm = Arc::new(HttpLlmClient::from_env()?);

    let deps = StepDeps { archive, blob, index, embeddings, embedding_model, transcript_fetcher, metadata_fetcher, llm };

    let mut registry = StepRegistry::new();
    register_default_steps(&mut registry, &deps)?;
    Ok(registry)
}

async fn run() -> WorkerResult<()> {
    let config = WorkerConfig::from_env();
    info!(?config.blob_backend, batch_size = %config.backfill_batch_size, "worker config loaded");

    let archive = Arc::new(ArchiveStore::new(ArchiveConfig::from_env()?));
    let blob = build_blob_store(&config).await?;
    let firestore = FirestoreClient::from_env().await?;
    let index: Arc<dyn IndexStore> = Arc::new(FirestoreIndexStore::new(firestore));

    let registry = Arc::new(build_registry(archive.clone(), blob, index, config.embedding_model.clone()).await?);

    let queue_config = QueueConfig::from_env();
    let queue_processor = QueueProcessor::new(queue_config, registry.clone(), archive.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let queue_shutdown = shutdown_rx.clone();
    let queue_handle = tokio::spawn(async move {
        if let Err(e) = queue_processor.run(queue_shutdown).await {
            error!(error = %e, "queue processor exited with an error");
        }
    });

    let backfill_archive = archive.clone();
    let backfill_registry = registry.clone();
    let backfill_batch_size = config.backfill_batch_size;
    let backfill_interval = config.backfill_interval;
    let mut backfill_shutdown = shutdown_rx.clone();
    let backfill_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(backfill_interval);
        interval.tick().await; // consume the immediate first tick, run on a real cadence
        loop {
            tokio::select! {
                _ = backfill_shutdown.changed() => {
                    if *backfill_shutdown.borrow() {
                        info!("shutdown signal received, stopping backfill scheduler");
                        break;
                    }
                }
                _ = interval.tick() => {
                    match run_backfill_all(&backfill_archive, &backfill_registry, backfill_batch_size).await {
                        Ok(summaries) => {
                            for summary in summaries {
                                if summary.queued > 0 {
                                    info!(step = %summary.step, queued = summary.queued, succeeded = summary.succeeded, failed = summary.failed, "backfill tick");
                                }
                                if !summary.quarantined.is_empty() {
                                    let ids: Vec<&str> = summary.quarantined.iter().map(|id| id.as_str()).collect();
                                    warn!(step = %summary.step, count = ids.len(), video_ids = ?ids, "videos soft-quarantined after repeated backfill failures");
                                }
                            }
                        }
                        Err(e) => error!(error = %e, "backfill tick failed"),
                    }
                }
            }
        }
    });

    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal");
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(queue_handle, backfill_handle);
    info!("worker shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    info!("starting ytcorpus-worker");

    if let Err(e) = run().await {
        error!(error = %e, "worker failed to start");
        std::process::exit(1);
    }
}
