//! `update_graph` (spec §4.6 step 8): upserts the VideoRecord into the
//! Index Store's `video` table, maintains `video→channel` / `video→topic`
//! edges derived from metadata and tags, and computes + stores the
//! document-level embedding from a canonical `summary_text`.
//!
//! Grounded on `steps.py`'s `update_graph` (edge maintenance against
//! `channel`/`topic` tables keyed by slugified ids) and
//! `ytcorpus-models::graph`'s `REL_VIDEO_CHANNEL`/`REL_VIDEO_TOPIC` edge
//! names.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as Json};
use ytcorpus_archive::ArchiveStore;
use ytcorpus_embeddings::EmbeddingClient;
use ytcorpus_index::IndexStore;
use ytcorpus_models::{ChannelRecord, TopicRecord, REL_VIDEO_CHANNEL, REL_VIDEO_TOPIC};
use ytcorpus_pipeline::{Context, Step};

use crate::error::StepError;

const VIDEO_TABLE: &str = "video";
const CHANNEL_TABLE: &str = "channel";
const TOPIC_TABLE: &str = "topic";

fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn video_to_fields(record: &ytcorpus_models::VideoRecord) -> Result<HashMap<String, Json>, String> {
    let value = serde_json::to_value(record).map_err(|e| String::from(StepError::IntegrityError(e.to_string())))?;
    match value {
        Json::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(String::from(StepError::IntegrityError("VideoRecord did not serialize to an object".to_string()))),
    }
}

pub struct UpdateGraph {
    archive: Arc<ArchiveStore>,
    index: Arc<dyn IndexStore>,
    embeddings: Arc<dyn EmbeddingClient>,
    embedding_model: String,
}

impl UpdateGraph {
    pub fn new(
        archive: Arc<ArchiveStore>,
        index: Arc<dyn IndexStore>,
        embeddings: Arc<dyn EmbeddingClient>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self { archive, index, embeddings, embedding_model: embedding_model.into() }
    }

    async fn link_channel(&self, video_id: &str, channel_id: &str, channel_title: &str) -> Result<(), String> {
        let existing = self.index.get(CHANNEL_TABLE, channel_id).await.map_err(StepError::from).map_err(String::from)?;
        let video_count = existing.as_ref().and_then(|r| r.fields.get("video_count")).and_then(|v| v.as_u64()).unwrap_or(0);
        let record = ChannelRecord {
            channel_id: channel_id.to_string(),
            channel_title: channel_title.to_string(),
            video_count: video_count as u32 + if existing.is_some() { 0 } else { 1 },
        };
        let fields = serde_json::to_value(&record)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .map(|m| m.into_iter().collect::<HashMap<_, _>>())
            .unwrap_or_default();
        self.index.upsert(CHANNEL_TABLE, channel_id, fields).await.map_err(StepError::from).map_err(String::from)?;
        self.index.link(video_id, REL_VIDEO_CHANNEL, channel_id, None).await.map_err(StepError::from).map_err(String::from)
    }

    async fn link_topic(&self, video_id: &str, topic_label: &str) -> Result<(), String> {
        let topic_id = slugify(topic_label);
        if topic_id.is_empty() {
            return Ok(());
        }
        let existing = self.index.get(TOPIC_TABLE, &topic_id).await.map_err(StepError::from).map_err(String::from)?;
        let video_count = existing.as_ref().and_then(|r| r.fields.get("video_count")).and_then(|v| v.as_u64()).unwrap_or(0);
        let record = TopicRecord { topic_id: topic_id.clone(), label: topic_label.to_string(), video_count: video_count as u32 + 1 };
        let fields = serde_json::to_value(&record)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .map(|m| m.into_iter().collect::<HashMap<_, _>>())
            .unwrap_or_default();
        self.index.upsert(TOPIC_TABLE, &topic_id, fields).await.map_err(StepError::from).map_err(String::from)?;
        self.index.link(video_id, REL_VIDEO_TOPIC, &topic_id, None).await.map_err(StepError::from).map_err(String::from)
    }
}

#[async_trait]
impl Step for UpdateGraph {
    async fn run(&self, ctx: &mut Context) -> Result<Json, String> {
        let mut record = self
            .archive
            .get(&ctx.video_id)
            .await
            .map_err(StepError::from)
            .map_err(String::from)?
            .ok_or_else(|| String::from(StepError::NotFound(format!("archive record for {}", ctx.video_id))))?;

        let title = record.youtube_metadata.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let channel_id = record.youtube_metadata.get("channel_id").and_then(|v| v.as_str()).map(String::from);
        let channel_title = record.youtube_metadata.get("channel_title").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        let tags: Vec<String> = ctx
            .get_value("generate_tags")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|t| t.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let summary: String = record
            .derived_outputs
            .iter()
            .rev()
            .find(|d| d.output_type == "summary")
            .and_then(|d| d.output_value.as_str().map(String::from))
            .unwrap_or_default();

        let summary_text = format!(
            "Video ID: {} Channel: {} Title: {} Summary: {} Topics: {}",
            ctx.video_id,
            channel_title,
            title,
            summary,
            tags.join(", ")
        );

        let embedding = self
            .embeddings
            .embed(&summary_text, &self.embedding_model)
            .await
            .map_err(StepError::from)
            .map_err(String::from)?;
        record.embedding = Some(embedding.clone());

        self.archive
            .set_embedding(&ctx.video_id, embedding)
            .await
            .map_err(StepError::from)
            .map_err(String::from)?;

        let fields = video_to_fields(&record)?;
        self.index.upsert(VIDEO_TABLE, ctx.video_id.as_str(), fields).await.map_err(StepError::from).map_err(String::from)?;

        if let Some(channel_id) = &channel_id {
            self.link_channel(ctx.video_id.as_str(), channel_id, &channel_title).await?;
        }
        for tag in &tags {
            self.link_topic(ctx.video_id.as_str(), tag).await?;
        }

        Ok(json!({"embedded": true, "channel_linked": channel_id.is_some(), "topics_linked": tags.len()}))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tempfile::tempdir;
    use ytcorpus_archive::ArchiveConfig;
    use ytcorpus_embeddings::EmbeddingError;
    use ytcorpus_index::{FirestoreError, IndexRecord, ScoredRecord};
    use ytcorpus_models::{ImportMetadata, ImportMethod, SourceType, VideoId};

    use super::*;

    struct InMemoryIndex(tokio::sync::Mutex<HashMap<(String, String), HashMap<String, Json>>>);

    impl InMemoryIndex {
        fn new() -> Self {
            Self(tokio::sync::Mutex::new(HashMap::new()))
        }
    }

    #[async_trait]
    impl IndexStore for InMemoryIndex {
        async fn upsert(&self, table: &str, id: &str, fields: HashMap<String, Json>) -> Result<(), FirestoreError> {
            self.0.lock().await.insert((table.to_string(), id.to_string()), fields);
            Ok(())
        }
        async fn get(&self, table: &str, id: &str) -> Result<Option<IndexRecord>, FirestoreError> {
            Ok(self.0.lock().await.get(&(table.to_string(), id.to_string())).map(|f| IndexRecord { id: id.to_string(), fields: f.clone() }))
        }
        async fn delete(&self, table: &str, id: &str) -> Result<(), FirestoreError> {
            self.0.lock().await.remove(&(table.to_string(), id.to_string()));
            Ok(())
        }
        async fn query(&self, _table: &str, _filter: &HashMap<String, Json>) -> Result<Vec<IndexRecord>, FirestoreError> {
            Ok(vec![])
        }
        async fn link(&self, _s: &str, _r: &str, _d: &str, _a: Option<HashMap<String, Json>>) -> Result<(), FirestoreError> {
            Ok(())
        }
        async fn unlink(&self, _s: &str, _r: &str, _d: &str) -> Result<(), FirestoreError> {
            Ok(())
        }
        async fn vector_search(
            &self,
            _table: &str,
            _field: &str,
            _query_vector: &[f32],
            _k: usize,
            _filter: Option<&HashMap<String, Json>>,
        ) -> Result<Vec<ScoredRecord>, FirestoreError> {
            Ok(vec![])
        }
        async fn init_schema(&self) -> Result<(), FirestoreError> {
            Ok(())
        }
    }

    struct StubEmbedder;
    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.5, 0.5])
        }
        async fn embed_batch(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.5, 0.5]).collect())
        }
    }

    #[tokio::test]
    async fn upserts_video_and_links_channel_and_topics() {
        let archive_dir = tempdir().unwrap();
        let archive = Arc::new(ArchiveStore::new(ArchiveConfig::new(archive_dir.path())));
        let index: Arc<dyn IndexStore> = Arc::new(InMemoryIndex::new());

        let video_id = VideoId::from("abc123");
        archive
            .update_transcript(
                &video_id,
                "u",
                "hello",
                None,
                Some(ImportMetadata::new(SourceType::SingleImport, ImportMethod::Cli)),
            )
            .await
            .unwrap();
        archive
            .update_metadata(
                &video_id,
                "u",
                HashMap::from([
                    ("title".to_string(), json!("My Title")),
                    ("channel_id".to_string(), json!("C1")),
                    ("channel_title".to_string(), json!("Chan")),
                ]),
                None,
            )
            .await
            .unwrap();

        let step = UpdateGraph::new(archive.clone(), index.clone(), Arc::new(StubEmbedder), "test-model");
        let mut ctx = Context::new(video_id.clone(), "u", HashMap::new());
        ctx.set_result("generate_tags", ytcorpus_pipeline::StepResult::ok(json!(["rust", "async"])));

        let value = step.run(&mut ctx).await.unwrap();
        assert_eq!(value["channel_linked"], json!(true));
        assert_eq!(value["topics_linked"], json!(2));

        let stored = index.get(VIDEO_TABLE, "abc123").await.unwrap().unwrap();
        assert!(stored.fields.contains_key("embedding"));

        let archived = archive.get(&video_id).await.unwrap().unwrap();
        assert_eq!(archived.embedding, Some(vec![0.5, 0.5]));

        let channel = index.get(CHANNEL_TABLE, "C1").await.unwrap().unwrap();
        assert_eq!(channel.fields.get("channel_title"), Some(&json!("Chan")));

        let topic = index.get(TOPIC_TABLE, "rust").await.unwrap().unwrap();
        assert_eq!(topic.fields.get("label"), Some(&json!("rust")));
    }
}
