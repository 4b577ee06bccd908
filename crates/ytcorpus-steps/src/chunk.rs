//! `chunk_transcript` (spec §4.6 step 5): partitions a video's
//! `timed_transcript` into token-bounded, pause-aligned windows and
//! upserts them to the Index Store's `video_chunk` table, deleting any
//! prior chunks for the video first so re-chunking is idempotent (spec §8
//! "chunk_transcript applied twice yields the same chunk set").
//!
//! Grounded on the hybrid time+token chunking strategy documented in
//! `steps.py`'s `chunk_transcript` docstring, with the windowing mechanics
//! adapted from `Smebbs-lytt/src/chunking/temporal.rs`'s segment-scan idiom.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as Json};
use ytcorpus_archive::ArchiveStore;
use ytcorpus_index::IndexStore;
use ytcorpus_models::{TimedTranscriptEntry, VideoChunk, VideoId};
use ytcorpus_pipeline::{Context, Step};

use crate::error::StepError;

/// Chunks are closed once they reach this target and a natural pause is
/// seen (spec §4.6 step 5 "target token count per chunk ≈ 2500").
const TARGET_TOKENS: u32 = 2500;
/// A chunk is force-closed at this size even without a pause, so a single
/// transcript with no pauses doesn't produce one unbounded chunk.
const MAX_TOKENS: u32 = TARGET_TOKENS * 2;
/// Minimum silence between cues to prefer as a chunk boundary (spec §4.6
/// step 5 "chunk boundaries only on natural pauses of ≥ 8 seconds").
const PAUSE_SECONDS: f64 = 8.0;

const VIDEO_CHUNK_TABLE: &str = "video_chunk";

/// Rough token estimate: whitespace-delimited word count. This is not a
/// tokenizer-accurate count; it is the same order-of-magnitude heuristic
/// `steps.py`'s token-budget chunker uses to decide chunk boundaries, and
/// the spec's invariant is "approximately" 2500, not an exact figure.
fn estimate_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

struct PendingChunk {
    entries: Vec<TimedTranscriptEntry>,
    tokens: u32,
}

impl PendingChunk {
    fn new() -> Self {
        Self { entries: Vec::new(), tokens: 0 }
    }

    fn push(&mut self, entry: TimedTranscriptEntry) {
        self.tokens += estimate_tokens(&entry.text);
        self.entries.push(entry);
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn into_chunk(self, video_id: &VideoId, index: u32) -> Option<VideoChunk> {
        if self.entries.is_empty() {
            return None;
        }
        let start_time = self.entries.first().unwrap().start;
        let last = self.entries.last().unwrap();
        let end_time = last.start + last.duration;
        let text = self.entries.iter().map(|e| e.text.as_str()).collect::<Vec<_>>().join(" ");
        Some(VideoChunk::new(video_id.clone(), index, text, start_time, end_time, self.tokens))
    }
}

/// Partition `entries` (assumed already ordered by `start`) into chunks
/// satisfying spec §4.6 step 5's boundary rules.
pub fn chunk_timed_transcript(video_id: &VideoId, entries: &[TimedTranscriptEntry]) -> Vec<VideoChunk> {
    let mut chunks = Vec::new();
    let mut current = PendingChunk::new();
    let mut index = 0u32;

    for (i, entry) in entries.iter().enumerate() {
        let gap = if i == 0 {
            0.0
        } else {
            let prev = &entries[i - 1];
            (entry.start - (prev.start + prev.duration)).max(0.0)
        };

        let at_pause = gap >= PAUSE_SECONDS;
        let should_close = !current.is_empty()
            && ((at_pause && current.tokens >= TARGET_TOKENS) || current.tokens >= MAX_TOKENS);

        if should_close {
            if let Some(chunk) = std::mem::replace(&mut current, PendingChunk::new()).into_chunk(video_id, index) {
                chunks.push(chunk);
                index += 1;
            }
        }

        current.push(entry.clone());
    }

    if let Some(chunk) = current.into_chunk(video_id, index) {
        chunks.push(chunk);
    }

    chunks
}

fn chunk_to_fields(chunk: &VideoChunk) -> HashMap<String, Json> {
    let mut fields = HashMap::new();
    fields.insert("video_id".to_string(), json!(chunk.video_id.as_str()));
    fields.insert("index".to_string(), json!(chunk.index));
    fields.insert("text".to_string(), json!(chunk.text));
    fields.insert("start_time".to_string(), json!(chunk.start_time));
    fields.insert("end_time".to_string(), json!(chunk.end_time));
    fields.insert("token_count".to_string(), json!(chunk.token_count));
    fields
}

pub struct ChunkTranscript {
    archive: Arc<ArchiveStore>,
    index: Arc<dyn IndexStore>,
}

impl ChunkTranscript {
    pub fn new(archive: Arc<ArchiveStore>, index: Arc<dyn IndexStore>) -> Self {
        Self { archive, index }
    }
}

#[async_trait]
impl Step for ChunkTranscript {
    async fn run(&self, ctx: &mut Context) -> Result<Json, String> {
        let record = self
            .archive
            .get(&ctx.video_id)
            .await
            .map_err(StepError::from)
            .map_err(String::from)?
            .ok_or_else(|| String::from(StepError::NotFound(format!("archive record for {}", ctx.video_id))))?;

        let timed = record
            .timed_transcript
            .ok_or_else(|| String::from(StepError::InvalidInput(format!("no timed_transcript for {}", ctx.video_id))))?;

        let chunks = chunk_timed_transcript(&ctx.video_id, &timed);
        if chunks.is_empty() {
            return Err(String::from(StepError::IntegrityError(format!(
                "chunking produced no chunks for {}",
                ctx.video_id
            ))));
        }

        // Delete pre-existing chunks first so re-chunking is idempotent
        // (spec §4.6 step 5).
        let existing = self
            .index
            .query(VIDEO_CHUNK_TABLE, &HashMap::from([("video_id".to_string(), json!(ctx.video_id.as_str()))]))
            .await
            .map_err(StepError::from)
            .map_err(String::from)?;
        for record in existing {
            self.index.delete(VIDEO_CHUNK_TABLE, &record.id).await.map_err(StepError::from).map_err(String::from)?;
        }

        for chunk in &chunks {
            self.index
                .upsert(VIDEO_CHUNK_TABLE, &chunk.chunk_id(), chunk_to_fields(chunk))
                .await
                .map_err(StepError::from)
                .map_err(String::from)?;
        }

        Ok(json!(chunks.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, start: f64, duration: f64) -> TimedTranscriptEntry {
        TimedTranscriptEntry { text: text.to_string(), start, duration }
    }

    #[test]
    fn splits_on_long_pause_once_target_reached() {
        let video_id = VideoId::from("v1");
        let long_text: String = std::iter::repeat("word").take(2600).collect::<Vec<_>>().join(" ");
        let entries = vec![
            entry(&long_text, 0.0, 100.0),
            entry("after the pause", 120.0, 2.0),
        ];
        let chunks = chunk_timed_transcript(&video_id, &entries);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 1);
        assert!(chunks[1].start_time >= chunks[0].end_time);
    }

    #[test]
    fn single_chunk_when_no_long_pause() {
        let video_id = VideoId::from("v1");
        let entries = vec![entry("hello", 0.0, 1.0), entry("world", 1.0, 1.0), entry("again", 2.0, 1.0)];
        let chunks = chunk_timed_transcript(&video_id, &entries);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world again");
        assert_eq!(chunks[0].start_time, 0.0);
        assert_eq!(chunks[0].end_time, 3.0);
    }

    #[test]
    fn chunk_ids_are_stable_and_unique_per_video() {
        let video_id = VideoId::from("v1");
        let entries = vec![entry("a", 0.0, 1.0), entry("b", 1.0, 1.0)];
        let chunks = chunk_timed_transcript(&video_id, &entries);
        assert_eq!(chunks[0].chunk_id(), "v1:0");
    }

    #[test]
    fn forced_split_on_oversized_chunk_without_pause() {
        let video_id = VideoId::from("v1");
        let mut entries = Vec::new();
        let mut t = 0.0;
        for i in 0..6000 {
            entries.push(entry("word", t, 0.1));
            t += 0.1;
            let _ = i;
        }
        let chunks = chunk_timed_transcript(&video_id, &entries);
        assert!(chunks.len() >= 2, "a very long transcript with no pauses must still split");
    }
}
