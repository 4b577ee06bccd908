//! Append-only output and processing-history entries attached to a `VideoRecord`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single LLM-generated output appended to `VideoRecord::llm_outputs`.
///
/// `(video_id, output_type, generated_at)` uniquely identifies an entry
/// (spec §3 invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LLMOutput {
    pub output_type: String,
    pub output_value: Value,
    pub generated_at: DateTime<Utc>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
}

impl LLMOutput {
    pub fn new(output_type: impl Into<String>, output_value: Value, model: impl Into<String>) -> Self {
        Self {
            output_type: output_type.into(),
            output_value,
            generated_at: Utc::now(),
            model: model.into(),
            cost_usd: None,
            prompt_tokens: None,
            completion_tokens: None,
        }
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = Some(cost_usd);
        self
    }

    pub fn with_tokens(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.prompt_tokens = Some(prompt_tokens);
        self.completion_tokens = Some(completion_tokens);
        self
    }
}

/// An output computed deterministically from prior outputs, versioned by a
/// manifest of every version key the transformer depends on at generation
/// time (used for staleness detection, spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DerivedOutput {
    pub output_type: String,
    pub output_value: Value,
    pub generated_at: DateTime<Utc>,
    pub transformer_version: String,
    #[serde(default)]
    pub transform_manifest: HashMap<String, String>,
    #[serde(default)]
    pub source_outputs: Vec<String>,
}

impl DerivedOutput {
    /// True if any key of `current_manifest` that this output depends on
    /// has a different value than what was recorded at generation time
    /// (spec §4.7 "Derived outputs are stale for transformer T iff...").
    pub fn is_stale(&self, current_manifest: &HashMap<String, String>) -> bool {
        self.transform_manifest
            .keys()
            .any(|k| current_manifest.get(k) != self.transform_manifest.get(k))
    }
}

/// A record of one successful (or attempted) pipeline run against a video,
/// appended to `VideoRecord::processing_history`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingRecord {
    pub version: String,
    pub processed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ProcessingRecord {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            processed_at: Utc::now(),
            target_index: None,
            notes: None,
        }
    }
}
