//! `fetch_transcript` and `fetch_metadata` (spec §4.6 steps 1-2): the two
//! independent entry points of the pipeline. Neither persists anything;
//! their results live only in the `Context` for `archive_raw` to pick up.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as Json};
use ytcorpus_pipeline::{Context, Step};

use crate::clients::{MetadataFetcher, TranscriptFetcher};

/// Plain transcript text as the step's `Json` value; the timed transcript
/// (when the fetcher provides one) is stashed in `ctx.metadata` under
/// `timed_transcript` per spec §4.6 step 1 ("may also emit `timed_transcript`
/// as a secondary value in `ctx.metadata`").
pub struct FetchTranscript {
    fetcher: Arc<dyn TranscriptFetcher>,
}

impl FetchTranscript {
    pub fn new(fetcher: Arc<dyn TranscriptFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Step for FetchTranscript {
    async fn run(&self, ctx: &mut Context) -> Result<Json, String> {
        let fetch = self.fetcher.fetch_transcript(&ctx.url).await.map_err(String::from)?;
        if let Some(timed) = &fetch.timed {
            let encoded = serde_json::to_value(timed).map_err(|e| format!("IntegrityError: {e}"))?;
            ctx.metadata.insert("timed_transcript".to_string(), encoded);
        }
        Ok(json!(fetch.text))
    }
}

/// Independent of `fetch_transcript` (spec §4.6 step 2): only needs
/// `ctx.video_id`.
pub struct FetchMetadata {
    fetcher: Arc<dyn MetadataFetcher>,
}

impl FetchMetadata {
    pub fn new(fetcher: Arc<dyn MetadataFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Step for FetchMetadata {
    async fn run(&self, ctx: &mut Context) -> Result<Json, String> {
        let metadata = self.fetcher.fetch_metadata(ctx.video_id.as_str()).await.map_err(String::from)?;
        serde_json::to_value(metadata).map_err(|e| format!("IntegrityError: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ytcorpus_models::VideoId;

    use super::*;
    use crate::clients::TranscriptFetch;
    use crate::error::{StepError, StepResult as ClientStepResult};

    struct StubTranscriptFetcher(Option<String>);
    #[async_trait]
    impl TranscriptFetcher for StubTranscriptFetcher {
        async fn fetch_transcript(&self, _url: &str) -> ClientStepResult<TranscriptFetch> {
            match &self.0 {
                Some(text) => Ok(TranscriptFetch { text: text.clone(), timed: None }),
                None => Err(StepError::TranscriptUnavailable("no transcript".to_string())),
            }
        }
    }

    struct StubMetadataFetcher;
    #[async_trait]
    impl MetadataFetcher for StubMetadataFetcher {
        async fn fetch_metadata(&self, video_id: &str) -> ClientStepResult<HashMap<String, Json>> {
            let mut m = HashMap::new();
            m.insert("title".to_string(), json!(format!("Title for {video_id}")));
            Ok(m)
        }
    }

    #[tokio::test]
    async fn fetch_transcript_returns_text() {
        let step = FetchTranscript::new(Arc::new(StubTranscriptFetcher(Some("hello world".to_string()))));
        let mut ctx = Context::new(VideoId::from("abc123"), "https://youtu.be/abc123", HashMap::new());
        let value = step.run(&mut ctx).await.unwrap();
        assert_eq!(value, json!("hello world"));
    }

    #[tokio::test]
    async fn fetch_transcript_unavailable_surfaces_as_error() {
        let step = FetchTranscript::new(Arc::new(StubTranscriptFetcher(None)));
        let mut ctx = Context::new(VideoId::from("abc123"), "https://youtu.be/abc123", HashMap::new());
        let err = step.run(&mut ctx).await.unwrap_err();
        assert!(err.starts_with("TranscriptUnavailable"));
    }

    #[tokio::test]
    async fn fetch_metadata_returns_map() {
        let step = FetchMetadata::new(Arc::new(StubMetadataFetcher));
        let mut ctx = Context::new(VideoId::from("abc123"), "https://youtu.be/abc123", HashMap::new());
        let value = step.run(&mut ctx).await.unwrap();
        assert_eq!(value["title"], json!("Title for abc123"));
    }
}
