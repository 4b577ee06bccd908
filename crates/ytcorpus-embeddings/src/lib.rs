//! Embedding Client adapter (spec component C4): `embed(text)->vector` and
//! `embed_batch(texts)->vectors` over an Infinity-compatible HTTP service.
//! The model name is always a parameter — this crate has no opinion on
//! which model backs global document embeddings versus chunk embeddings.

pub mod client;
pub mod error;

pub use client::{EmbeddingClient, EmbeddingConfig, HttpEmbeddingClient};
pub use error::{EmbeddingError, EmbeddingResult};
