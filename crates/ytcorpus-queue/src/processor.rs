//! The Queue Processor (spec component C9, §4.8): watches `pending/`,
//! `processing/`, `completed/` under a configured root and, on each poll,
//! claims a CSV file, runs the pipeline over every row, and files the CSV
//! away under `completed/`.
//!
//! Grounded on `original_source/compose/worker/queue_processor.py`'s
//! `poll_and_process`/`process_csv` loop, with the `tokio::select!`
//! shutdown idiom of `vclip-worker/src/executor.rs`'s claim loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use ytcorpus_models::{ChannelContext, SourceType, VideoId};
use ytcorpus_pipeline::{Context, PipelineConfig, StepRegistry};

use crate::error::QueueResult;
use crate::row::{infer_source_type, parse_rows};

/// Delay between rows within a file, rate-limiting upstream services (spec
/// §4.8 step 3, `process_csv`'s `await asyncio.sleep(1)`).
const DEFAULT_INTER_ROW_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub root: PathBuf,
    pub poll_interval: Duration,
    pub inter_row_delay: Duration,
    /// Step names to run per row; empty means every registered step.
    pub steps: Vec<String>,
}

impl QueueConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), poll_interval: Duration::from_secs(10), inter_row_delay: DEFAULT_INTER_ROW_DELAY, steps: Vec::new() }
    }

    /// `QUEUE_ROOT` / `POLL_INTERVAL_SECONDS` (spec §6); `inter_row_delay`
    /// and `steps` are not environment-configurable and default as above.
    pub fn from_env() -> Self {
        let root = std::env::var("QUEUE_ROOT").unwrap_or_else(|_| "./data/queues".to_string());
        let poll_interval = std::env::var("POLL_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(10));
        Self { root: PathBuf::from(root), poll_interval, inter_row_delay: DEFAULT_INTER_ROW_DELAY, steps: Vec::new() }
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.root.join("pending")
    }

    pub fn processing_dir(&self) -> PathBuf {
        self.root.join("processing")
    }

    pub fn completed_dir(&self) -> PathBuf {
        self.root.join("completed")
    }
}

pub struct QueueProcessor {
    config: QueueConfig,
    registry: Arc<StepRegistry>,
    archive: Arc<ytcorpus_archive::ArchiveStore>,
}

impl QueueProcessor {
    pub fn new(config: QueueConfig, registry: Arc<StepRegistry>, archive: Arc<ytcorpus_archive::ArchiveStore>) -> Self {
        Self { config, registry, archive }
    }

    async fn ensure_dirs(&self) -> QueueResult<()> {
        for dir in [self.config.pending_dir(), self.config.processing_dir(), self.config.completed_dir()] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Resume files left in `processing/` by a crashed prior run (spec §4.8
    /// "implementers must either resume-from-processing on startup, or
    /// document the alternative" — SPEC_FULL.md §C.5 chooses resume).
    async fn resume_processing(&self) -> QueueResult<()> {
        let dir = self.config.processing_dir();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            info!(file = %path.display(), "resuming file left in processing/ from a prior run");
            self.process_file(&path).await;
            let name = path.file_name().expect("csv path always has a file name");
            let completed_path = self.config.completed_dir().join(name);
            if let Err(e) = tokio::fs::rename(&path, &completed_path).await {
                error!(file = %path.display(), error = %e, "failed to move resumed file to completed/");
            }
        }
        Ok(())
    }

    /// One poll: claim every `pending/*.csv` file in lexicographic order,
    /// process it, then file it under `completed/` (spec §4.8 steps 1-4).
    async fn poll_once(&self) -> QueueResult<()> {
        let pending_dir = self.config.pending_dir();
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&pending_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(name) = path.file_name() {
                    names.push(name.to_os_string());
                }
            }
        }
        names.sort();

        for name in names {
            let pending_path = pending_dir.join(&name);
            let processing_path = self.config.processing_dir().join(&name);

            if let Err(e) = tokio::fs::rename(&pending_path, &processing_path).await {
                debug!(file = ?name, error = %e, "could not claim file, presumably grabbed by another worker");
                continue;
            }
            info!(file = ?name, "claimed queue file");

            self.process_file(&processing_path).await;

            let completed_path = self.config.completed_dir().join(&name);
            if let Err(e) = tokio::fs::rename(&processing_path, &completed_path).await {
                error!(file = ?name, error = %e, "failed to move processed file to completed/");
            } else {
                info!(file = ?name, "moved to completed/");
            }
        }

        Ok(())
    }

    async fn process_file(&self, path: &Path) {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                error!(file = %path.display(), error = %e, "could not read queue file");
                return;
            }
        };

        let rows = match parse_rows(&bytes) {
            Ok(r) => r,
            Err(e) => {
                error!(file = %path.display(), error = %e, "could not parse queue file as CSV");
                return;
            }
        };

        let source_type = infer_source_type(&rows);
        info!(file = %path.display(), rows = rows.len(), source_type = %source_type, "processing queue file");

        let mut processed = 0usize;
        let mut failed = 0usize;

        for (i, row) in rows.iter().enumerate() {
            let video_id = match row.resolved_video_id() {
                Ok(id) => id,
                Err(e) => {
                    warn!(row = i, error = %e, "skipping row with unresolvable video id");
                    failed += 1;
                    continue;
                }
            };

            let mut metadata = HashMap::new();
            metadata.insert("source_type".to_string(), json!(source_type.to_string()));
            metadata.insert("import_method".to_string(), json!("scheduled"));
            if let Some(title) = &row.title {
                metadata.insert("title".to_string(), json!(title));
            }
            if let Some(channel_id) = &row.channel_id {
                metadata.insert("channel_id".to_string(), json!(channel_id));
            }
            if let Some(channel_title) = &row.channel_title {
                metadata.insert("channel_title".to_string(), json!(channel_title));
            }

            let ctx = Context::new(VideoId::from(video_id.clone()), row.url.clone(), metadata);
            let config = PipelineConfig { steps: self.config.steps.clone(), ..PipelineConfig::default() };

            match ytcorpus_pipeline::run_pipeline(&self.registry, &self.archive, ctx, &config).await {
                Ok(result) if result.all_successful() => {
                    processed += 1;
                }
                Ok(_) => {
                    failed += 1;
                    warn!(%video_id, "pipeline run completed with at least one failed step");
                }
                Err(e) => {
                    failed += 1;
                    error!(%video_id, error = %e, "pipeline run failed");
                }
            }

            if i + 1 < rows.len() {
                tokio::time::sleep(self.config.inter_row_delay).await;
            }
        }

        info!(file = %path.display(), processed, failed, total = rows.len(), "finished processing queue file");
    }

    /// Run the poll loop until `shutdown` is signalled. The in-flight file
    /// (if any) finishes before the loop exits; a file left in
    /// `processing/` at that point is picked up by `resume_processing` on
    /// the next start (spec §4.8 Cancellation).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> QueueResult<()> {
        self.ensure_dirs().await?;
        self.resume_processing().await?;

        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("shutdown signal received, stopping queue processor");
                        break;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "error during queue poll");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Exposed for `archive_raw` callers that want a `ChannelContext` built the
/// same way the Queue Processor does, from a row's optional channel fields.
pub fn channel_context_for(channel_id: Option<&str>, channel_title: Option<&str>, source_type: SourceType) -> ChannelContext {
    ChannelContext {
        channel_id: channel_id.map(String::from),
        channel_name: channel_title.map(String::from),
        is_bulk_import: matches!(source_type, SourceType::BulkChannel | SourceType::BulkMultiChannel),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value as Json;
    use tempfile::tempdir;
    use ytcorpus_archive::ArchiveConfig;
    use ytcorpus_pipeline::{Context as PipelineContext, Step};

    use super::*;

    struct NoopStep;
    #[async_trait]
    impl Step for NoopStep {
        async fn run(&self, _ctx: &mut PipelineContext) -> Result<Json, String> {
            Ok(json!("ok"))
        }
    }

    #[tokio::test]
    async fn claims_processes_and_completes_a_file() {
        let root = tempdir().unwrap();
        let archive_dir = tempdir().unwrap();
        let archive = Arc::new(ytcorpus_archive::ArchiveStore::new(ArchiveConfig::new(archive_dir.path())));

        let mut registry = StepRegistry::new();
        registry.register_step("noop", &[], Arc::new(NoopStep), "noop source", None).unwrap();
        let registry = Arc::new(registry);

        let config = QueueConfig { steps: vec!["noop".to_string()], poll_interval: Duration::from_millis(10), ..QueueConfig::new(root.path()) };
        let processor = QueueProcessor::new(config.clone(), registry, archive);
        processor.ensure_dirs().await.unwrap();

        tokio::fs::write(
            config.pending_dir().join("batch.csv"),
            "url,video_id,title,channel_id,channel_title\nhttps://youtu.be/abc12345678,abc12345678,T,C1,Chan\n",
        )
        .await
        .unwrap();

        processor.poll_once().await.unwrap();

        assert!(!config.pending_dir().join("batch.csv").exists());
        assert!(!config.processing_dir().join("batch.csv").exists());
        assert!(config.completed_dir().join("batch.csv").exists());
    }

    #[tokio::test]
    async fn resumes_files_left_in_processing_on_startup() {
        let root = tempdir().unwrap();
        let archive_dir = tempdir().unwrap();
        let archive = Arc::new(ytcorpus_archive::ArchiveStore::new(ArchiveConfig::new(archive_dir.path())));

        let mut registry = StepRegistry::new();
        registry.register_step("noop", &[], Arc::new(NoopStep), "noop source", None).unwrap();
        let registry = Arc::new(registry);

        let config = QueueConfig { steps: vec!["noop".to_string()], ..QueueConfig::new(root.path()) };
        let processor = QueueProcessor::new(config.clone(), registry, archive);
        processor.ensure_dirs().await.unwrap();

        tokio::fs::write(
            config.processing_dir().join("crashed.csv"),
            "url,video_id,title,channel_id,channel_title\nhttps://youtu.be/def98765432,def98765432,T,,\n",
        )
        .await
        .unwrap();

        processor.resume_processing().await.unwrap();

        assert!(!config.processing_dir().join("crashed.csv").exists());
        assert!(config.completed_dir().join("crashed.csv").exists());
    }
}
