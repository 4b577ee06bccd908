//! Per-run pipeline state (spec §4.5): the execution context threaded
//! through a single `run_pipeline` call, and the outcome of one step.
//!
//! Grounded on `original_source/compose/services/pipeline/models.py`'s
//! `StepResult`/`PipelineContext`/`PipelineConfig` dataclasses.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use ytcorpus_models::VideoId;

/// The outcome of a single step invocation within a pipeline run.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub value: Option<Json>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: f64,
    pub cached: bool,
}

impl StepResult {
    pub fn ok(value: Json) -> Self {
        Self { value: Some(value), success: true, error: None, duration_ms: 0.0, cached: false }
    }

    pub fn ok_cached(value: Json) -> Self {
        Self { value: Some(value), success: true, error: None, duration_ms: 0.0, cached: true }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self { value: None, success: false, error: Some(error.into()), duration_ms: 0.0, cached: false }
    }

    fn with_duration_ms(mut self, ms: f64) -> Self {
        self.duration_ms = ms;
        self
    }
}

/// Everything a step needs to read or write while running, and everything a
/// caller needs to inspect once `run_pipeline` returns.
#[derive(Debug, Clone)]
pub struct Context {
    pub video_id: VideoId,
    pub url: String,
    pub started_at: DateTime<Utc>,
    /// Caller-provided inputs (e.g. `source_type`, `import_method`) plus any
    /// secondary values a step stashes for a later step to read (e.g.
    /// `fetch_transcript` stashing `timed_transcript` alongside its plain
    /// text result).
    pub metadata: HashMap<String, Json>,
    pub results: HashMap<String, StepResult>,
}

impl Context {
    pub fn new(video_id: VideoId, url: impl Into<String>, metadata: HashMap<String, Json>) -> Self {
        Self { video_id, url: url.into(), started_at: Utc::now(), metadata, results: HashMap::new() }
    }

    pub fn get_result(&self, step: &str) -> Option<&StepResult> {
        self.results.get(step)
    }

    /// The step's value, but only if it actually succeeded.
    pub fn get_value(&self, step: &str) -> Option<&Json> {
        self.results.get(step).filter(|r| r.success).and_then(|r| r.value.as_ref())
    }

    pub fn set_result(&mut self, step: impl Into<String>, result: StepResult) {
        self.results.insert(step.into(), result);
    }

    pub(crate) fn set_timed_result(&mut self, step: impl Into<String>, mut result: StepResult, duration_ms: f64) {
        result = result.with_duration_ms(duration_ms);
        self.results.insert(step.into(), result);
    }

    pub fn has_step(&self, step: &str) -> bool {
        self.results.contains_key(step)
    }

    pub fn all_successful(&self) -> bool {
        self.results.values().all(|r| r.success)
    }
}

/// Which steps to run and how to run them (spec §4.5).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target step names; an empty list means "every registered step".
    pub steps: Vec<String>,
    /// Declared but, matching the reference pipeline, not consulted by the
    /// execution algorithm itself — left as an interface knob for callers
    /// who want to pre-filter `steps` against `pipeline_state` themselves.
    pub skip_cached: bool,
    pub continue_on_error: bool,
    /// Persist `pipeline_state[step] = version_hash(step)` after each
    /// successful step (spec §4.5 step c).
    pub update_graph: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { steps: Vec::new(), skip_cached: true, continue_on_error: false, update_graph: true }
    }
}
