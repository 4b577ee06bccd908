//! `embed_chunks` (spec §4.6 step 6): reads chunks lacking embeddings,
//! batch-embeds their texts, and writes the embeddings back via `upsert`.
//! Grounded on `steps.py`'s `embed_chunks` ("filter to chunks without
//! embeddings" then a single `embed_batch` call).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as Json};
use ytcorpus_embeddings::EmbeddingClient;
use ytcorpus_index::IndexStore;
use ytcorpus_pipeline::{Context, Step};

use crate::error::StepError;

const VIDEO_CHUNK_TABLE: &str = "video_chunk";
const CHUNK_EMBEDDING_FIELD: &str = "embedding";

pub struct EmbedChunks {
    index: Arc<dyn IndexStore>,
    embeddings: Arc<dyn EmbeddingClient>,
    model: String,
}

impl EmbedChunks {
    pub fn new(index: Arc<dyn IndexStore>, embeddings: Arc<dyn EmbeddingClient>, model: impl Into<String>) -> Self {
        Self { index, embeddings, model: model.into() }
    }
}

#[async_trait]
impl Step for EmbedChunks {
    async fn run(&self, ctx: &mut Context) -> Result<Json, String> {
        let chunks = self
            .index
            .query(VIDEO_CHUNK_TABLE, &HashMap::from([("video_id".to_string(), json!(ctx.video_id.as_str()))]))
            .await
            .map_err(StepError::from)
            .map_err(String::from)?;

        if chunks.is_empty() {
            return Err(String::from(StepError::NotFound(format!("no chunks found for {}", ctx.video_id))));
        }

        let unembedded: Vec<_> = chunks
            .into_iter()
            .filter(|c| !c.fields.contains_key(CHUNK_EMBEDDING_FIELD))
            .collect();

        if unembedded.is_empty() {
            return Ok(json!(0));
        }

        let texts: Vec<String> = unembedded
            .iter()
            .map(|c| c.fields.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string())
            .collect();

        let vectors = self.embeddings.embed_batch(&texts, &self.model).await.map_err(StepError::from).map_err(String::from)?;

        for (chunk, vector) in unembedded.iter().zip(vectors) {
            let mut fields = chunk.fields.clone();
            fields.insert(CHUNK_EMBEDDING_FIELD.to_string(), json!(vector));
            self.index.upsert(VIDEO_CHUNK_TABLE, &chunk.id, fields).await.map_err(StepError::from).map_err(String::from)?;
        }

        Ok(json!(texts.len()))
    }
}
