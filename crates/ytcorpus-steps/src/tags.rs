//! `generate_tags` (spec §4.6 step 4). Depends only on `fetch_transcript`:
//! calls the LLM client for structured tags, persists the raw generation as
//! an `LLMOutput` via `append_llm_output`, then returns the parsed tag list
//! as the step's value.
//!
//! `steps.py`'s `generate_tags` is a stub returning `[]` pending async
//! support (see its `TODO`); DESIGN.md records that the stub's *dependency
//! wiring* is followed here but not its body, since spec §4.6 requires a
//! real LLM call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as Json};
use ytcorpus_archive::ArchiveStore;
use ytcorpus_models::LLMOutput;
use ytcorpus_pipeline::{Context, Step};

use crate::clients::LlmClient;
use crate::error::StepError;

pub struct GenerateTags {
    llm: Arc<dyn LlmClient>,
    archive: Arc<ArchiveStore>,
}

impl GenerateTags {
    pub fn new(llm: Arc<dyn LlmClient>, archive: Arc<ArchiveStore>) -> Self {
        Self { llm, archive }
    }
}

#[async_trait]
impl Step for GenerateTags {
    async fn run(&self, ctx: &mut Context) -> Result<Json, String> {
        let transcript = ctx
            .get_value("fetch_transcript")
            .and_then(|v| v.as_str())
            .ok_or_else(|| String::from(StepError::InvalidInput("no transcript for tag generation".to_string())))?;

        let generation = self.llm.generate_tags(transcript).await.map_err(String::from)?;

        let mut output = LLMOutput::new("tags", json!(generation.tags), generation.model.clone());
        if let Some(cost) = generation.cost_usd {
            output = output.with_cost(cost);
        }
        if let (Some(prompt), Some(completion)) = (generation.prompt_tokens, generation.completion_tokens) {
            output = output.with_tokens(prompt, completion);
        }

        self.archive
            .append_llm_output(&ctx.video_id, output)
            .await
            .map_err(StepError::from)
            .map_err(String::from)?;

        Ok(json!(generation.tags))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;
    use ytcorpus_archive::ArchiveConfig;
    use ytcorpus_models::{ImportMetadata, ImportMethod, SourceType, VideoId};

    use super::*;
    use crate::clients::TagsGeneration;
    use crate::error::StepResult as ClientStepResult;

    struct StubLlm;
    #[async_trait]
    impl LlmClient for StubLlm {
        async fn generate_tags(&self, _transcript: &str) -> ClientStepResult<TagsGeneration> {
            Ok(TagsGeneration {
                tags: vec!["rust".to_string(), "async".to_string()],
                model: "stub-model".to_string(),
                cost_usd: Some(0.001),
                prompt_tokens: Some(100),
                completion_tokens: Some(20),
            })
        }
    }

    #[tokio::test]
    async fn generates_and_archives_tags() {
        let dir = tempdir().unwrap();
        let archive = Arc::new(ArchiveStore::new(ArchiveConfig::new(dir.path())));
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

        let step = GenerateTags::new(Arc::new(StubLlm), archive.clone());
        let mut ctx = Context::new(video_id.clone(), "u", HashMap::new());
        ctx.set_result("fetch_transcript", ytcorpus_pipeline::StepResult::ok(json!("hello")));

        let value = step.run(&mut ctx).await.unwrap();
        assert_eq!(value, json!(["rust", "async"]));

        let record = archive.get(&video_id).await.unwrap().unwrap();
        assert_eq!(record.llm_outputs.len(), 1);
        assert_eq!(record.llm_outputs[0].output_type, "tags");
        assert_eq!(record.llm_outputs[0].cost_usd, Some(0.001));
    }
}
