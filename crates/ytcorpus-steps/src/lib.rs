//! Step Library (spec component C7): the eight canonical steps that make
//! up the default video-processing chain, plus the collaborator contracts
//! (`TranscriptFetcher`, `MetadataFetcher`, `LlmClient`) the archive- and
//! network-touching steps depend on.
//!
//! `register_default_steps` wires all eight into a `StepRegistry` with the
//! dependency graph spec §4.6 specifies; callers needing a custom chain can
//! instead call the individual `register_step` calls directly.

pub mod archive_step;
pub mod cache;
pub mod chunk;
pub mod clients;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod graph_step;
pub mod tags;

use std::sync::Arc;

pub use archive_step::ArchiveRaw;
pub use cache::CacheToBlob;
pub use chunk::{chunk_timed_transcript, ChunkTranscript};
pub use clients::{
    HttpLlmClient, HttpTranscriptFetcher, LlmClient, MetadataFetcher, TagsGeneration, TranscriptFetch,
    TranscriptFetcher, YoutubeMetadataFetcher,
};
pub use embed::EmbedChunks;
pub use error::{StepError, StepResult};
pub use fetch::{FetchMetadata, FetchTranscript};
pub use graph_step::UpdateGraph;
pub use tags::GenerateTags;

use ytcorpus_archive::ArchiveStore;
use ytcorpus_blob::BlobStore;
use ytcorpus_embeddings::EmbeddingClient;
use ytcorpus_index::IndexStore;
use ytcorpus_pipeline::{PipelineResult, StepRegistry};

/// Collaborators the default step chain needs, gathered so
/// `register_default_steps` takes one argument instead of seven.
pub struct StepDeps {
    pub archive: Arc<ArchiveStore>,
    pub blob: Arc<dyn BlobStore>,
    pub index: Arc<dyn IndexStore>,
    pub embeddings: Arc<dyn EmbeddingClient>,
    pub embedding_model: String,
    pub transcript_fetcher: Arc<dyn TranscriptFetcher>,
    pub metadata_fetcher: Arc<dyn MetadataFetcher>,
    pub llm: Arc<dyn LlmClient>,
}

/// Register the eight steps of spec §4.6 in one call, with the exact
/// dependency edges the section lists. Each step's version hash is derived
/// from its own source file so a code change to just `chunk.rs`, say,
/// invalidates only `chunk_transcript`'s cached pipeline state.
pub fn register_default_steps(registry: &mut StepRegistry, deps: &StepDeps) -> PipelineResult<()> {
    registry.register_step(
        "fetch_transcript",
        &[],
        Arc::new(FetchTranscript::new(deps.transcript_fetcher.clone())),
        include_str!("fetch.rs"),
        Some("Fetches the raw transcript (and timed cues, when available) for a video."),
    )?;

    registry.register_step(
        "fetch_metadata",
        &[],
        Arc::new(FetchMetadata::new(deps.metadata_fetcher.clone())),
        include_str!("fetch.rs"),
        Some("Fetches YouTube metadata for a video."),
    )?;

    registry.register_step(
        "archive_raw",
        &["fetch_transcript", "fetch_metadata"],
        Arc::new(ArchiveRaw::new(deps.archive.clone())),
        include_str!("archive_step.rs"),
        Some("Writes the fetched transcript and metadata to the Archive Store."),
    )?;

    registry.register_step(
        "generate_tags",
        &["fetch_transcript"],
        Arc::new(GenerateTags::new(deps.llm.clone(), deps.archive.clone())),
        include_str!("tags.rs"),
        Some("Calls the LLM client to generate topic tags, archived as an LLMOutput."),
    )?;

    registry.register_step(
        "chunk_transcript",
        &["archive_raw"],
        Arc::new(ChunkTranscript::new(deps.archive.clone(), deps.index.clone())),
        include_str!("chunk.rs"),
        Some("Partitions the archived timed transcript into pause-aligned, token-bounded chunks."),
    )?;

    registry.register_step(
        "embed_chunks",
        &["chunk_transcript"],
        Arc::new(EmbedChunks::new(deps.index.clone(), deps.embeddings.clone(), deps.embedding_model.clone())),
        include_str!("embed.rs"),
        Some("Embeds chunks lacking an embedding and writes the vectors back."),
    )?;

    registry.register_step(
        "cache_to_blob",
        &["archive_raw"],
        Arc::new(CacheToBlob::new(deps.archive.clone(), deps.blob.clone())),
        include_str!("cache.rs"),
        Some("Writes a canonical JSON snapshot of the archive record to the Blob Store."),
    )?;

    registry.register_step(
        "update_graph",
        &["cache_to_blob"],
        Arc::new(UpdateGraph::new(deps.archive.clone(), deps.index.clone(), deps.embeddings.clone(), deps.embedding_model.clone())),
        include_str!("graph_step.rs"),
        Some("Upserts the VideoRecord, maintains channel/topic edges, and stores the document embedding."),
    )?;

    Ok(())
}
