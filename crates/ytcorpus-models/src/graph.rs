//! Aggregation keys linked to videos by `video→channel` and `video→topic`
//! relationship edges (spec §3).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Aggregation record for a YouTube channel, keyed by `channel_id`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChannelRecord {
    pub channel_id: String,
    pub channel_title: String,
    #[serde(default)]
    pub video_count: u32,
}

/// Aggregation record for a topic derived from tags/metadata, keyed by a
/// normalized topic name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TopicRecord {
    pub topic_id: String,
    pub label: String,
    #[serde(default)]
    pub video_count: u32,
}

/// Name of the `video→channel` relationship edge, used with
/// `IndexStore::link`/`unlink`.
pub const REL_VIDEO_CHANNEL: &str = "video_channel";
/// Name of the `video→topic` relationship edge.
pub const REL_VIDEO_TOPIC: &str = "video_topic";
/// Name of the `video→video_chunk` relationship edge.
pub const REL_VIDEO_CHUNK: &str = "video_chunk";
