//! Video record and import-provenance models.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::outputs::{DerivedOutput, LLMOutput, ProcessingRecord};

/// Unique identifier for a video (the YouTube video id, or an import-time
/// assigned id for non-YouTube sources).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single entry of a timed transcript (caption cue).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TimedTranscriptEntry {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Provenance of an import: how and why a video entered the corpus.
///
/// Closed enumeration per spec §3 (`ImportMetadata.source_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    SingleImport,
    ReplImport,
    BulkChannel,
    BulkMultiChannel,
    QueueImport,
}

impl SourceType {
    /// Default `recommendation_weight` for this source type (spec §3 invariant 6).
    pub const fn default_recommendation_weight(self) -> f64 {
        match self {
            SourceType::SingleImport | SourceType::ReplImport => 1.0,
            SourceType::QueueImport => 0.8,
            SourceType::BulkChannel => 0.5,
            SourceType::BulkMultiChannel => 0.2,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceType::SingleImport => "single_import",
            SourceType::ReplImport => "repl_import",
            SourceType::BulkChannel => "bulk_channel",
            SourceType::BulkMultiChannel => "bulk_multi_channel",
            SourceType::QueueImport => "queue_import",
        };
        write!(f, "{s}")
    }
}

/// How an import was triggered. Closed enumeration per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImportMethod {
    #[default]
    Cli,
    Repl,
    Scheduled,
    Api,
}

/// Channel provenance attached to an import.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct ChannelContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub is_bulk_import: bool,
}

/// Provenance and recommendation-weighting metadata for a video import.
///
/// See spec §3 (`ImportMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImportMetadata {
    pub source_type: SourceType,
    pub imported_at: DateTime<Utc>,
    pub import_method: ImportMethod,
    #[serde(default)]
    pub channel_context: ChannelContext,
    pub recommendation_weight: f64,
}

impl ImportMetadata {
    /// Build import metadata with the default recommendation weight for `source_type`.
    pub fn new(source_type: SourceType, import_method: ImportMethod) -> Self {
        Self {
            source_type,
            imported_at: Utc::now(),
            import_method,
            channel_context: ChannelContext::default(),
            recommendation_weight: source_type.default_recommendation_weight(),
        }
    }

    pub fn with_channel_context(mut self, ctx: ChannelContext) -> Self {
        self.channel_context = ctx;
        self
    }
}

/// The canonical per-video record (spec §3 `VideoRecord`).
///
/// Stable identity is `video_id`. `llm_outputs`, `derived_outputs`, and
/// `processing_history` are append-only: entries are never mutated or
/// reordered once written (invariant 2).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    pub video_id: VideoId,
    pub url: String,
    pub fetched_at: DateTime<Utc>,

    /// Free-form YouTube metadata (title, channel_id, channel_title,
    /// duration_seconds, view_count, published_at, tags, description, ...).
    #[serde(default)]
    pub youtube_metadata: HashMap<String, Value>,

    #[serde(default)]
    pub raw_transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_transcript: Option<Vec<TimedTranscriptEntry>>,

    #[serde(default)]
    pub llm_outputs: Vec<LLMOutput>,
    #[serde(default)]
    pub derived_outputs: Vec<DerivedOutput>,
    #[serde(default)]
    pub processing_history: Vec<ProcessingRecord>,

    pub import_metadata: ImportMetadata,

    /// Last successful version hash per step name.
    #[serde(default)]
    pub pipeline_state: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Back-pointer to the archive record location, e.g. `youtube/2026-07/abc123.json`.
    pub archive_path: String,

    /// Consecutive-failure counters per step, used for the backfill engine's
    /// soft-quarantine marker (spec §4.7). Not part of the spec's core
    /// VideoRecord fields but carried alongside it so a single read gives
    /// the backfill engine everything it needs.
    #[serde(default)]
    pub backfill_failures: HashMap<String, u32>,

    /// Fields present in the stored document but not modeled above are
    /// preserved verbatim on read and re-emitted on write (spec §6).
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl VideoRecord {
    /// Construct a brand-new record as `update_transcript`/`update_metadata`
    /// do when no prior record exists for `video_id`.
    pub fn new(video_id: VideoId, url: impl Into<String>, import_metadata: ImportMetadata) -> Self {
        Self {
            video_id,
            url: url.into(),
            fetched_at: Utc::now(),
            youtube_metadata: HashMap::new(),
            raw_transcript: String::new(),
            timed_transcript: None,
            llm_outputs: Vec::new(),
            derived_outputs: Vec::new(),
            processing_history: Vec::new(),
            import_metadata,
            pipeline_state: HashMap::new(),
            embedding: None,
            archive_path: String::new(),
            backfill_failures: HashMap::new(),
            extra: HashMap::new(),
        }
    }

    /// The most recent entry of `llm_outputs` matching `output_type`, by
    /// `generated_at` (spec §3 invariant 2: "the latest is defined as max by
    /// generated_at").
    pub fn latest_llm_output(&self, output_type: &str) -> Option<&LLMOutput> {
        self.llm_outputs
            .iter()
            .filter(|o| o.output_type == output_type)
            .max_by_key(|o| o.generated_at)
    }

    pub fn latest_derived_output(&self, output_type: &str) -> Option<&DerivedOutput> {
        self.derived_outputs
            .iter()
            .filter(|o| o.output_type == output_type)
            .max_by_key(|o| o.generated_at)
    }
}
