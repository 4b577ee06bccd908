//! Backfill Engine (spec component C8, §4.7).
//!
//! Grounded on `original_source/compose/services/pipeline/runner.py`'s
//! `get_backfill_queue` / `get_backfill_counts` / `run_backfill`: a video is
//! stale for a step when `pipeline_state[step]` is absent or does not match
//! the step's current `version_hash`. Backfilling re-runs just that one step
//! (via `run_pipeline`) for each stale video, in deterministic `video_id`
//! order, and soft-quarantines a `(video_id, step)` pair after five
//! consecutive failures (spec §4.7, SPEC_FULL.md §C.4) by leaning on
//! `ArchiveStore::record_backfill_failure`, which `set_pipeline_state`
//! clears on the next success.

use serde::Serialize;
use tracing::warn;
use ytcorpus_archive::ArchiveStore;
use ytcorpus_models::{VideoId, VideoRecord};

use crate::context::{Context, PipelineConfig};
use crate::error::PipelineResult;
use crate::registry::StepRegistry;
use crate::runner::run_pipeline;

/// Consecutive-failure threshold before a `(video_id, step)` pair is
/// considered soft-quarantined and excluded from the backfill queue.
pub const QUARANTINE_THRESHOLD: u32 = 5;

/// A single stale `(video_id, step)` candidate for backfilling.
#[derive(Debug, Clone, Serialize)]
pub struct BackfillItem {
    pub video_id: VideoId,
    pub url: String,
    pub current_version: Option<String>,
    pub required_version: String,
}

/// Outcome of one `run_backfill` call.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BackfillSummary {
    pub step: String,
    pub queued: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BackfillError>,
    /// Videos whose failure count for `step` crossed `QUARANTINE_THRESHOLD`
    /// during this run (SPEC_FULL.md §C.4 supplement), so callers can
    /// observe and log them.
    pub quarantined: Vec<VideoId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillError {
    pub video_id: VideoId,
    pub error: String,
}

fn is_stale(record: &VideoRecord, step: &str, required_version: &str) -> bool {
    record.pipeline_state.get(step).map(|v| v.as_str()) != Some(required_version)
}

fn is_quarantined(record: &VideoRecord, step: &str) -> bool {
    record.backfill_failures.get(step).copied().unwrap_or(0) >= QUARANTINE_THRESHOLD
}

/// Every video whose `pipeline_state[step]` doesn't match the step's
/// current version and which hasn't been soft-quarantined, in stable
/// `video_id` order, capped at `limit`.
pub async fn backfill_queue(
    archive: &ArchiveStore,
    registry: &StepRegistry,
    step: &str,
    limit: usize,
) -> PipelineResult<Vec<BackfillItem>> {
    let required_version = registry
        .version_hash(step)
        .ok_or_else(|| crate::error::PipelineError::UnknownStep(step.to_string()))?
        .to_string();

    let mut records = archive.iter(None, None).await?;
    records.sort_by(|a, b| a.video_id.as_str().cmp(b.video_id.as_str()));

    let mut items = Vec::new();
    for record in records {
        if is_quarantined(&record, step) || !is_stale(&record, step, &required_version) {
            continue;
        }
        items.push(BackfillItem {
            current_version: record.pipeline_state.get(step).cloned(),
            required_version: required_version.clone(),
            video_id: record.video_id,
            url: record.url,
        });
        if items.len() >= limit {
            break;
        }
    }
    Ok(items)
}

/// For every registered step, how many videos are currently stale for it
/// (ignoring the `limit` that `backfill_queue` applies).
pub async fn backfill_counts(
    archive: &ArchiveStore,
    registry: &StepRegistry,
) -> PipelineResult<Vec<(String, usize)>> {
    let records = archive.iter(None, None).await?;
    let mut counts = Vec::new();
    for step in registry.all_names() {
        let required_version = registry.version_hash(&step).expect("step just listed by all_names").to_string();
        let count = records
            .iter()
            .filter(|r| !is_quarantined(r, &step) && is_stale(r, &step, &required_version))
            .count();
        counts.push((step, count));
    }
    Ok(counts)
}

/// Re-run `step` for up to `batch_size` stale videos, persisting
/// `pipeline_state` and backfill-failure counters as `run_pipeline` does
/// normally.
pub async fn run_backfill(
    archive: &ArchiveStore,
    registry: &StepRegistry,
    step: &str,
    batch_size: usize,
) -> PipelineResult<BackfillSummary> {
    let candidates = backfill_queue(archive, registry, step, batch_size).await?;
    let mut summary = BackfillSummary { step: step.to_string(), queued: candidates.len(), ..Default::default() };

    for candidate in candidates {
        let ctx = Context::new(candidate.video_id.clone(), candidate.url.clone(), Default::default());
        let config = PipelineConfig { steps: vec![step.to_string()], ..Default::default() };

        let outcome = run_pipeline(registry, archive, ctx, &config).await;
        match outcome {
            Ok(ctx) if ctx.get_result(step).map(|r| r.success).unwrap_or(false) => {
                summary.succeeded += 1;
            }
            Ok(ctx) => {
                let error = ctx.get_result(step).and_then(|r| r.error.clone()).unwrap_or_default();
                match archive.record_backfill_failure(&candidate.video_id, step).await {
                    Ok(count) if count >= QUARANTINE_THRESHOLD => summary.quarantined.push(candidate.video_id.clone()),
                    Ok(_) => {}
                    Err(e) => warn!(video_id = %candidate.video_id, step, error = %e, "failed to record backfill failure"),
                }
                summary.failed += 1;
                summary.errors.push(BackfillError { video_id: candidate.video_id, error });
            }
            Err(e) => {
                match archive.record_backfill_failure(&candidate.video_id, step).await {
                    Ok(count) if count >= QUARANTINE_THRESHOLD => summary.quarantined.push(candidate.video_id.clone()),
                    Ok(_) => {}
                    Err(inner) => warn!(video_id = %candidate.video_id, step, error = %inner, "failed to record backfill failure"),
                }
                summary.failed += 1;
                summary.errors.push(BackfillError { video_id: candidate.video_id, error: e.to_string() });
            }
        }
    }

    Ok(summary)
}

/// Formats `backfill_counts()` as one "step: N stale" entry per step,
/// joined for a single structured log line (SPEC_FULL.md §C.3) — not a CLI
/// report.
pub async fn status_report(archive: &ArchiveStore, registry: &StepRegistry) -> PipelineResult<String> {
    let counts = backfill_counts(archive, registry).await?;
    Ok(counts.iter().map(|(step, n)| format!("{step}: {n} stale")).collect::<Vec<_>>().join(", "))
}

/// Run `run_backfill` for every registered step, in name order.
pub async fn run_backfill_all(
    archive: &ArchiveStore,
    registry: &StepRegistry,
    batch_size: usize,
) -> PipelineResult<Vec<BackfillSummary>> {
    let mut summaries = Vec::new();
    for step in registry.all_names() {
        summaries.push(run_backfill(archive, registry, &step, batch_size).await?);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value as Json;
    use tempfile::tempdir;
    use ytcorpus_archive::ArchiveConfig;
    use ytcorpus_models::{ImportMetadata, ImportMethod, SourceType};

    use super::*;
    use crate::registry::Step;

    struct OkStep;
    #[async_trait]
    impl Step for OkStep {
        async fn run(&self, _ctx: &mut Context) -> Result<Json, String> {
            Ok(Json::Null)
        }
    }

    struct FailStep;
    #[async_trait]
    impl Step for FailStep {
        async fn run(&self, _ctx: &mut Context) -> Result<Json, String> {
            Err("transient".to_string())
        }
    }

    async fn archive_with_videos(n: usize) -> ArchiveStore {
        let dir = tempdir().unwrap();
        let archive = ArchiveStore::new(ArchiveConfig::new(dir.path().to_path_buf()));
        for i in 0..n {
            let video_id = VideoId::from_string(format!("vid{i:02}"));
            let import_metadata = ImportMetadata::new(SourceType::SingleImport, ImportMethod::Cli);
            let _ = import_metadata;
            archive
                .update_metadata(&video_id, &format!("https://youtu.be/vid{i:02}"), HashMap::new(), None)
                .await
                .unwrap();
        }
        std::mem::forget(dir);
        archive
    }

    #[tokio::test]
    async fn backfill_queue_lists_stale_videos_in_order() {
        let archive = archive_with_videos(3).await;
        let mut registry = StepRegistry::new();
        registry.register_step("tag", &[], Arc::new(OkStep), "source", None).unwrap();

        let queue = backfill_queue(&archive, &registry, "tag", 10).await.unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue[0].video_id.as_str(), "vid00");
        assert_eq!(queue[2].video_id.as_str(), "vid02");
    }

    #[tokio::test]
    async fn run_backfill_marks_succeeded_videos_no_longer_stale() {
        let archive = archive_with_videos(2).await;
        let mut registry = StepRegistry::new();
        registry.register_step("tag", &[], Arc::new(OkStep), "source", None).unwrap();

        let summary = run_backfill(&archive, &registry, "tag", 10).await.unwrap();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);

        let remaining = backfill_queue(&archive, &registry, "tag", 10).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn repeated_failures_lead_to_quarantine() {
        let archive = archive_with_videos(1).await;
        let mut registry = StepRegistry::new();
        registry.register_step("tag", &[], Arc::new(FailStep), "source", None).unwrap();

        let mut last_summary = None;
        for _ in 0..QUARANTINE_THRESHOLD {
            last_summary = Some(run_backfill(&archive, &registry, "tag", 10).await.unwrap());
        }

        let queue = backfill_queue(&archive, &registry, "tag", 10).await.unwrap();
        assert!(queue.is_empty(), "video should be soft-quarantined after {QUARANTINE_THRESHOLD} failures");

        let last_summary = last_summary.unwrap();
        assert_eq!(last_summary.quarantined.len(), 1, "the run crossing the threshold should report the video as quarantined");
        assert_eq!(last_summary.quarantined[0].as_str(), "vid00");
    }

    #[tokio::test]
    async fn status_report_lists_stale_counts_per_step() {
        let archive = archive_with_videos(2).await;
        let mut registry = StepRegistry::new();
        registry.register_step("tag", &[], Arc::new(OkStep), "source", None).unwrap();

        let report = status_report(&archive, &registry).await.unwrap();
        assert_eq!(report, "tag: 2 stale");

        run_backfill(&archive, &registry, "tag", 10).await.unwrap();
        let report = status_report(&archive, &registry).await.unwrap();
        assert_eq!(report, "tag: 0 stale");
    }
}
