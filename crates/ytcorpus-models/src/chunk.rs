//! Transcript chunks for fine-grained retrieval (spec §3 `VideoChunk`).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::VideoId;

/// A time-bounded, bounded-token window of a transcript with stable
/// `(video_id, index)` identity (spec §8 property 2).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoChunk {
    pub video_id: VideoId,
    pub index: u32,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub token_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl VideoChunk {
    pub fn new(
        video_id: VideoId,
        index: u32,
        text: impl Into<String>,
        start_time: f64,
        end_time: f64,
        token_count: u32,
    ) -> Self {
        Self {
            video_id,
            index,
            text: text.into(),
            start_time,
            end_time,
            token_count,
            embedding: None,
        }
    }

    /// `chunk_id = video_id + ":" + index` (spec §3).
    pub fn chunk_id(&self) -> String {
        format!("{}:{}", self.video_id, self.index)
    }
}
