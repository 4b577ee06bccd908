//! HTTP implementation of [`EmbeddingClient`] (spec component C4).
//!
//! Grounded on `original_source/compose/services/embeddings/__init__.py`'s
//! `EmbeddingService` (a thin POST-to-`/embeddings` wrapper around an
//! Infinity-compatible server) and the `reqwest`-with-retry idiom of
//! `vclip-firestore/src/client.rs`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EmbeddingError, EmbeddingResult};

/// `embed(text)->vector`, `embed_batch(texts)->vectors` (spec §4.3 C4). The
/// model name is a parameter, not baked into the trait, so callers can
/// route global document embeddings and chunk embeddings through different
/// models via the same client.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str, model: &str) -> EmbeddingResult<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String], model: &str) -> EmbeddingResult<Vec<Vec<f32>>>;
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub default_model: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl EmbeddingConfig {
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_model: default_model.into(),
            timeout: Duration::from_secs(120),
            max_retries: 3,
        }
    }

    /// Build from `EMBEDDING_URL` / `EMBEDDING_MODEL` env vars (spec §6).
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("EMBEDDING_URL").unwrap_or_else(|_| "http://localhost:7997".to_string()),
            default_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "Alibaba-NLP/gte-large-en-v1.5".to_string()),
            timeout: Duration::from_secs(120),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// An `EmbeddingClient` backed by an Infinity-compatible `/embeddings` HTTP
/// endpoint (the same wire shape as OpenAI's embeddings API).
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> EmbeddingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(EmbeddingError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> EmbeddingResult<Self> {
        Self::new(EmbeddingConfig::from_env())
    }

    async fn post_embeddings(&self, texts: &[String], model: &str) -> EmbeddingResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = EmbeddingRequest { model, input: texts };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(url = %url, model, batch = texts.len(), attempt, "requesting embeddings");

            let result = self.http.post(&url).json(&body).send().await;
            match result {
                Ok(response) if response.status().is_success() => {
                    let parsed: EmbeddingResponse = response.json().await?;
                    return Ok(parsed.data.into_iter().map(|d| d.embedding).collect());
                }
                Ok(response) if response.status().is_server_error() && attempt <= self.config.max_retries => {
                    warn!(status = %response.status(), attempt, "embedding service server error, retrying");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(EmbeddingError::RequestFailed(format!("{status}: {text}")));
                }
                Err(e) if attempt <= self.config.max_retries => {
                    warn!(error = %e, attempt, "embedding request failed, retrying");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
                Err(e) => return Err(EmbeddingError::Network(e)),
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1u64 << attempt.min(5)))
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str, model: &str) -> EmbeddingResult<Vec<f32>> {
        let model = if model.is_empty() { &self.config.default_model } else { model };
        let inputs = vec![text.to_string()];
        let mut vectors = self.post_embeddings(&inputs, model).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embeddings response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String], model: &str) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = if model.is_empty() { &self.config.default_model } else { model };
        self.post_embeddings(texts, model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embed_returns_single_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}]
            })))
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(EmbeddingConfig::new(server.uri(), "test-model")).unwrap();
        let v = client.embed("hello", "test-model").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_batch_returns_multiple_vectors_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0]}, {"embedding": [2.0]}]
            })))
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(EmbeddingConfig::new(server.uri(), "test-model")).unwrap();
        let vs = client
            .embed_batch(&["a".to_string(), "b".to_string()], "test-model")
            .await
            .unwrap();
        assert_eq!(vs, vec![vec![1.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn embed_batch_empty_input_skips_request() {
        let server = MockServer::start().await;
        let client = HttpEmbeddingClient::new(EmbeddingConfig::new(server.uri(), "test-model")).unwrap();
        let vs = client.embed_batch(&[], "test-model").await.unwrap();
        assert!(vs.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_surfaces_as_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(EmbeddingConfig::new(server.uri(), "test-model")).unwrap();
        let err = client.embed("hello", "test-model").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::RequestFailed(_)));
    }
}
