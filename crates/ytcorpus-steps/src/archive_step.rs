//! `archive_raw` (spec §4.6 step 3): the archive-first boundary. Writes
//! `update_transcript` then `update_metadata`, matching `steps.py`'s
//! `archive_raw` body; order matters only for which call creates the
//! record (merge semantics make the two calls commute, spec §4.1). No
//! downstream step (blob/index write) may run before this one completes,
//! which `register.rs` enforces by making every later step depend on it
//! transitively.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as Json};
use ytcorpus_archive::ArchiveStore;
use ytcorpus_models::{ChannelContext, ImportMethod, SourceType, TimedTranscriptEntry};
use ytcorpus_pipeline::{Context, Step};

use crate::error::StepError;

pub struct ArchiveRaw {
    archive: Arc<ArchiveStore>,
}

impl ArchiveRaw {
    pub fn new(archive: Arc<ArchiveStore>) -> Self {
        Self { archive }
    }
}

#[async_trait]
impl Step for ArchiveRaw {
    async fn run(&self, ctx: &mut Context) -> Result<Json, String> {
        let transcript = ctx
            .get_value("fetch_transcript")
            .and_then(|v| v.as_str())
            .ok_or_else(|| String::from(StepError::InvalidInput("no transcript to archive".to_string())))?
            .to_string();

        let metadata: HashMap<String, Json> = ctx
            .get_value("fetch_metadata")
            .and_then(|v| v.as_object())
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let timed_transcript: Option<Vec<TimedTranscriptEntry>> = ctx
            .metadata
            .get("timed_transcript")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let source_type = ctx
            .metadata
            .get("source_type")
            .and_then(|v| v.as_str())
            .and_then(|s| parse_source_type(s))
            .unwrap_or_default();
        let import_method = ctx
            .metadata
            .get("import_method")
            .and_then(|v| v.as_str())
            .and_then(|s| parse_import_method(s))
            .unwrap_or_default();
        let recommendation_weight = ctx
            .metadata
            .get("recommendation_weight")
            .and_then(|v| v.as_f64())
            .unwrap_or_else(|| source_type.default_recommendation_weight());

        let channel_context = ChannelContext {
            channel_id: metadata.get("channel_id").and_then(|v| v.as_str()).map(String::from),
            channel_name: metadata.get("channel_title").and_then(|v| v.as_str()).map(String::from),
            is_bulk_import: matches!(source_type, SourceType::BulkChannel | SourceType::BulkMultiChannel),
        };

        let mut import_metadata = ytcorpus_models::ImportMetadata::new(source_type, import_method);
        import_metadata.recommendation_weight = recommendation_weight;
        import_metadata = import_metadata.with_channel_context(channel_context);

        let record = self
            .archive
            .update_transcript(&ctx.video_id, &ctx.url, transcript, timed_transcript, Some(import_metadata))
            .await
            .map_err(StepError::from)
            .map_err(String::from)?;

        if !metadata.is_empty() {
            self.archive
                .update_metadata(&ctx.video_id, &ctx.url, metadata, None)
                .await
                .map_err(StepError::from)
                .map_err(String::from)?;
        }

        Ok(json!(record.archive_path))
    }
}

fn parse_source_type(s: &str) -> Option<SourceType> {
    match s {
        "single_import" => Some(SourceType::SingleImport),
        "repl_import" => Some(SourceType::ReplImport),
        "bulk_channel" => Some(SourceType::BulkChannel),
        "bulk_multi_channel" => Some(SourceType::BulkMultiChannel),
        "queue_import" => Some(SourceType::QueueImport),
        _ => None,
    }
}

fn parse_import_method(s: &str) -> Option<ImportMethod> {
    match s {
        "cli" => Some(ImportMethod::Cli),
        "repl" => Some(ImportMethod::Repl),
        "scheduled" => Some(ImportMethod::Scheduled),
        "api" => Some(ImportMethod::Api),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use ytcorpus_archive::ArchiveConfig;
    use ytcorpus_models::VideoId;

    use super::*;

    #[tokio::test]
    async fn archives_transcript_and_metadata() {
        let dir = tempdir().unwrap();
        let archive = Arc::new(ArchiveStore::new(ArchiveConfig::new(dir.path())));
        let step = ArchiveRaw::new(archive.clone());

        let mut ctx = Context::new(VideoId::from("abc123"), "https://youtu.be/abc123", HashMap::new());
        ctx.set_result("fetch_transcript", ytcorpus_pipeline::StepResult::ok(json!("hello world")));
        ctx.set_result(
            "fetch_metadata",
            ytcorpus_pipeline::StepResult::ok(json!({"title": "T", "channel_id": "C1", "channel_title": "Ch"})),
        );

        let value = step.run(&mut ctx).await.unwrap();
        assert!(value.as_str().unwrap().starts_with("youtube/"));

        let record = archive.get(&VideoId::from("abc123")).await.unwrap().unwrap();
        assert_eq!(record.raw_transcript, "hello world");
        assert_eq!(record.youtube_metadata.get("title").unwrap(), "T");
    }

    #[tokio::test]
    async fn missing_transcript_fails_without_writing() {
        let dir = tempdir().unwrap();
        let archive = Arc::new(ArchiveStore::new(ArchiveConfig::new(dir.path())));
        let step = ArchiveRaw::new(archive.clone());

        let mut ctx = Context::new(VideoId::from("nope0000000"), "https://youtu.be/nope0000000", HashMap::new());
        let err = step.run(&mut ctx).await.unwrap_err();
        assert!(err.starts_with("InvalidInput"));
        assert!(!archive.exists(&VideoId::from("nope0000000")).await.unwrap());
    }
}
