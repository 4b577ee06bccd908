//! Shared data models for the YouTube ingestion corpus.
//!
//! This crate provides Serde/schemars types for:
//! - The per-video archive record and its append-only output history
//!   (`video`, `outputs`)
//! - Transcript chunks used for fine-grained retrieval (`chunk`)
//! - Channel/topic aggregation keys and relationship edge names (`graph`)
//! - YouTube URL/video-id extraction shared by the step library (`utils`)

pub mod chunk;
pub mod graph;
pub mod outputs;
pub mod utils;
pub mod video;

pub use chunk::VideoChunk;
pub use graph::{ChannelRecord, TopicRecord, REL_VIDEO_CHANNEL, REL_VIDEO_CHUNK, REL_VIDEO_TOPIC};
pub use outputs::{DerivedOutput, LLMOutput, ProcessingRecord};
pub use utils::{extract_youtube_id, extract_youtube_id_legacy, YoutubeIdError, YoutubeIdResult};
pub use video::{
    ChannelContext, ImportMetadata, ImportMethod, SourceType, TimedTranscriptEntry, VideoId,
    VideoRecord,
};
