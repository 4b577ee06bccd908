//! Pipeline Runner (spec component C5, §4.5).
//!
//! Grounded on `original_source/compose/services/pipeline/runner.py`'s
//! `run_pipeline`: resolve an execution order, then for each step in order,
//! verify its dependencies already succeeded, run it with timing, record the
//! result, and best-effort persist `pipeline_state`. A step whose
//! dependency failed (or is missing) is itself recorded as a failure without
//! being invoked, and the run stops at the first failure unless
//! `continue_on_error` is set.

use std::time::Instant;

use tracing::warn;
use ytcorpus_archive::ArchiveStore;
use ytcorpus_models::ProcessingRecord;

use crate::context::{Context, PipelineConfig, StepResult};
use crate::error::PipelineResult;
use crate::registry::StepRegistry;

/// Run `config.steps` (or every registered step, if empty) against `ctx`,
/// mutating it in place and returning it once the run has stopped.
///
/// `archive` is used only for the best-effort `pipeline_state` write in step
/// (c); a failure to persist it is logged and never fails the step itself.
pub async fn run_pipeline(
    registry: &StepRegistry,
    archive: &ArchiveStore,
    mut ctx: Context,
    config: &PipelineConfig,
) -> PipelineResult<Context> {
    let target_names: Vec<String> =
        if config.steps.is_empty() { registry.all_names() } else { config.steps.clone() };
    let targets: Vec<&str> = target_names.iter().map(|s| s.as_str()).collect();
    let order = registry.execution_order(&targets)?;

    for step_name in order {
        let metadata = registry
            .metadata(&step_name)
            .unwrap_or_else(|| panic!("execution order returned unregistered step '{step_name}'"));

        // (a) a dependency that didn't succeed (or never ran) fails this step
        // without invoking it.
        let missing_dep = metadata.dependencies.iter().find(|dep| {
            ctx.get_result(dep).map(|r| !r.success).unwrap_or(true)
        });
        if let Some(dep) = missing_dep {
            let result = StepResult::fail(format!("dependency '{dep}' failed or missing"));
            ctx.set_result(step_name.clone(), result);
            if !config.continue_on_error {
                break;
            }
            continue;
        }

        // (b) run the step, timing it, and catching any error it returns.
        let step = registry.step(&step_name).expect("step metadata without a registered step");
        let start = Instant::now();
        let outcome = step.run(&mut ctx).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let result = match outcome {
            Ok(value) => StepResult::ok(value),
            Err(error) => StepResult::fail(error),
        };
        let succeeded = result.success;
        ctx.set_timed_result(step_name.clone(), result, duration_ms);

        // (c) best-effort pipeline_state update. A processing_history entry
        // is appended alongside it so `pipeline_state[s] = v` always has a
        // corresponding `processing_history` entry with `version = v`
        // (spec §8 testable invariant 1).
        if succeeded && config.update_graph {
            if let Err(e) = archive.set_pipeline_state(&ctx.video_id, &step_name, &metadata.version_hash).await {
                warn!(video_id = %ctx.video_id, step = %step_name, error = %e, "failed to persist pipeline_state");
            }
            let mut entry = ProcessingRecord::new(metadata.version_hash.clone());
            entry.notes = Some(step_name.clone());
            if let Err(e) = archive.append_processing_record(&ctx.video_id, entry).await {
                warn!(video_id = %ctx.video_id, step = %step_name, error = %e, "failed to append processing_history entry");
            }
        }

        // (d) stop at the first failure unless told to continue.
        if !succeeded && !config.continue_on_error {
            break;
        }
    }

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value as Json};
    use tempfile::tempdir;
    use ytcorpus_archive::ArchiveConfig;
    use ytcorpus_models::{ImportMetadata, ImportMethod, SourceType, VideoId, VideoRecord};

    use super::*;
    use crate::registry::Step;

    struct OkStep(Json);
    #[async_trait]
    impl Step for OkStep {
        async fn run(&self, _ctx: &mut Context) -> Result<Json, String> {
            Ok(self.0.clone())
        }
    }

    struct FailStep;
    #[async_trait]
    impl Step for FailStep {
        async fn run(&self, _ctx: &mut Context) -> Result<Json, String> {
            Err("boom".to_string())
        }
    }

    struct RecordingStep(Arc<Mutex<Vec<String>>>, &'static str);
    #[async_trait]
    impl Step for RecordingStep {
        async fn run(&self, _ctx: &mut Context) -> Result<Json, String> {
            self.0.lock().unwrap().push(self.1.to_string());
            Ok(Json::Null)
        }
    }

    async fn seeded_archive() -> (ArchiveStore, VideoId) {
        let dir = tempdir().unwrap();
        let archive = ArchiveStore::new(ArchiveConfig::new(dir.path().to_path_buf()));
        let video_id = VideoId::from_string("abc123".to_string());
        let import_metadata = ImportMetadata::new(SourceType::SingleImport, ImportMethod::Cli);
        let record = VideoRecord::new(video_id.clone(), "https://youtu.be/abc123".to_string(), import_metadata);
        archive.update_metadata(&video_id, &record.url, HashMap::new(), None).await.unwrap();
        // leak the tempdir for the duration of the test by forgetting it
        std::mem::forget(dir);
        (archive, video_id)
    }

    #[tokio::test]
    async fn runs_steps_in_dependency_order_and_persists_pipeline_state() {
        let (archive, video_id) = seeded_archive().await;
        let order_log = Arc::new(Mutex::new(Vec::new()));

        let mut registry = StepRegistry::new();
        registry
            .register_step("first", &[], Arc::new(RecordingStep(order_log.clone(), "first")), "s1", None)
            .unwrap();
        registry
            .register_step("second", &["first"], Arc::new(RecordingStep(order_log.clone(), "second")), "s2", None)
            .unwrap();

        let ctx = Context::new(video_id.clone(), "https://youtu.be/abc123", HashMap::new());
        let config = PipelineConfig { steps: vec!["second".to_string()], ..Default::default() };
        let result = run_pipeline(&registry, &archive, ctx, &config).await.unwrap();

        assert!(result.all_successful());
        assert_eq!(*order_log.lock().unwrap(), vec!["first".to_string(), "second".to_string()]);

        let record = archive.get(&video_id).await.unwrap().unwrap();
        assert!(record.pipeline_state.contains_key("first"));
        assert!(record.pipeline_state.contains_key("second"));

        // spec §8 testable invariant 1: every pipeline_state[s] = v has a
        // matching processing_history entry with version = v.
        for (step, version) in &record.pipeline_state {
            assert!(
                record.processing_history.iter().any(|p| &p.version == version),
                "no processing_history entry for {step}'s version {version}"
            );
        }
    }

    #[tokio::test]
    async fn dependency_failure_skips_dependent_without_running_it() {
        let (archive, video_id) = seeded_archive().await;
        let mut registry = StepRegistry::new();
        registry.register_step("broken", &[], Arc::new(FailStep), "s1", None).unwrap();
        registry.register_step("dependent", &["broken"], Arc::new(OkStep(json!(1))), "s2", None).unwrap();

        let ctx = Context::new(video_id, "https://youtu.be/abc123", HashMap::new());
        let config = PipelineConfig { steps: vec!["dependent".to_string()], ..Default::default() };
        let result = run_pipeline(&registry, &archive, ctx, &config).await.unwrap();

        assert!(!result.get_result("broken").unwrap().success);
        assert!(!result.get_result("dependent").unwrap().success);
        assert_eq!(
            result.get_result("dependent").unwrap().error.as_deref(),
            Some("dependency 'broken' failed or missing")
        );
    }

    #[tokio::test]
    async fn continue_on_error_runs_independent_steps_after_a_failure() {
        let (archive, video_id) = seeded_archive().await;
        let mut registry = StepRegistry::new();
        registry.register_step("broken", &[], Arc::new(FailStep), "s1", None).unwrap();
        registry.register_step("independent", &[], Arc::new(OkStep(json!(2))), "s2", None).unwrap();

        let ctx = Context::new(video_id, "https://youtu.be/abc123", HashMap::new());
        let config = PipelineConfig {
            steps: vec!["broken".to_string(), "independent".to_string()],
            continue_on_error: true,
            ..Default::default()
        };
        let result = run_pipeline(&registry, &archive, ctx, &config).await.unwrap();

        assert!(!result.get_result("broken").unwrap().success);
        assert!(result.get_result("independent").unwrap().success);
    }
}
