//! Collaborator contracts for the Step Library's upstream calls (spec §1:
//! "Concrete transcript/metadata fetch clients, LLM clients... specified
//! only by the contract the core consumes"). Each trait is the seam a step
//! depends on; one HTTP-backed implementation is provided per trait,
//! matching the precedent set by the Blob/Index/Embedding adapter crates
//! (C2-C4), which are likewise named out-of-scope "drivers" in spec §1 yet
//! ship a concrete implementation alongside the trait.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as Json;
use tracing::{debug, warn};
use ytcorpus_models::TimedTranscriptEntry;

use crate::error::{StepError, StepResult};

/// Output of a transcript fetch: plain text plus, when the upstream
/// provides per-cue timing, the `timed_transcript` secondary value
/// `chunk_transcript` later reads from the archive (spec §4.6 step 1).
#[derive(Debug, Clone)]
pub struct TranscriptFetch {
    pub text: String,
    pub timed: Option<Vec<TimedTranscriptEntry>>,
}

/// `fetch_transcript`'s upstream collaborator.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch_transcript(&self, url: &str) -> StepResult<TranscriptFetch>;
}

/// `fetch_metadata`'s upstream collaborator.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch_metadata(&self, video_id: &str) -> StepResult<HashMap<String, Json>>;
}

/// Output of `generate_tags`'s LLM call, carrying the fields
/// `append_llm_output` persists alongside the parsed tags (spec §4.6 step 4).
#[derive(Debug, Clone)]
pub struct TagsGeneration {
    pub tags: Vec<String>,
    pub model: String,
    pub cost_usd: Option<f64>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

/// `generate_tags`'s upstream collaborator.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_tags(&self, transcript: &str) -> StepResult<TagsGeneration>;
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1u64 << attempt.min(5)))
}

/// Fetches transcripts from a proxy-fronted transcript API over HTTP,
/// grounded on `tools/services/youtube/transcript_service.py`'s
/// proxy-enabled fetch and the retry idiom of
/// `vclip-firestore/src/client.rs`.
pub struct HttpTranscriptFetcher {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl HttpTranscriptFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            max_retries: 3,
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("TRANSCRIPT_API_URL").unwrap_or_else(|_| "http://localhost:8008".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptApiResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    cues: Vec<TranscriptApiCue>,
}

#[derive(Debug, Deserialize)]
struct TranscriptApiCue {
    text: String,
    start: f64,
    duration: f64,
}

#[async_trait]
impl TranscriptFetcher for HttpTranscriptFetcher {
    async fn fetch_transcript(&self, url: &str) -> StepResult<TranscriptFetch> {
        let endpoint = format!("{}/transcript", self.base_url.trim_end_matches('/'));
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(%url, attempt, "fetching transcript");
            let response = self.http.get(&endpoint).query(&[("url", url)]).send().await;
            match response {
                Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => {
                    return Err(StepError::TranscriptUnavailable(format!("no transcript for {url}")));
                }
                Ok(resp) if resp.status().is_success() => {
                    let parsed: TranscriptApiResponse = resp
                        .json()
                        .await
                        .map_err(|e| StepError::UpstreamUnavailable(e.to_string()))?;
                    if parsed.text.trim().is_empty() {
                        return Err(StepError::TranscriptUnavailable(format!("empty transcript for {url}")));
                    }
                    let timed = if parsed.cues.is_empty() {
                        None
                    } else {
                        Some(
                            parsed
                                .cues
                                .into_iter()
                                .map(|c| TimedTranscriptEntry { text: c.text, start: c.start, duration: c.duration })
                                .collect(),
                        )
                    };
                    return Ok(TranscriptFetch { text: parsed.text, timed });
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt <= self.max_retries => {
                    warn!(attempt, "transcript service rate-limited, retrying");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
                Ok(resp) if resp.status().is_server_error() && attempt <= self.max_retries => {
                    warn!(status = %resp.status(), attempt, "transcript service error, retrying");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
                Ok(resp) => {
                    let status = resp.status();
                    return Err(StepError::UpstreamUnavailable(format!("transcript service returned {status}")));
                }
                Err(e) if attempt <= self.max_retries => {
                    warn!(error = %e, attempt, "transcript request failed, retrying");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
                Err(e) => return Err(StepError::UpstreamUnavailable(e.to_string())),
            }
        }
    }
}

/// Fetches metadata from the YouTube Data API v3, grounded on
/// `tools/services/youtube/metadata_service.py`'s `YouTubeMetadataService`
/// (ported from `googleapiclient` to a direct `reqwest` call).
pub struct YoutubeMetadataFetcher {
    http: reqwest::Client,
    api_key: String,
}

impl YoutubeMetadataFetcher {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), api_key: api_key.into() }
    }

    pub fn from_env() -> StepResult<Self> {
        let api_key = std::env::var("YOUTUBE_API_KEY")
            .map_err(|_| StepError::InvalidInput("YOUTUBE_API_KEY is not set".to_string()))?;
        Ok(Self::new(api_key))
    }
}

#[async_trait]
impl MetadataFetcher for YoutubeMetadataFetcher {
    async fn fetch_metadata(&self, video_id: &str) -> StepResult<HashMap<String, Json>> {
        let url = "https://www.googleapis.com/youtube/v3/videos";
        let response = self
            .http
            .get(url)
            .query(&[("part", "snippet,statistics,contentDetails"), ("id", video_id), ("key", &self.api_key)])
            .send()
            .await
            .map_err(|e| StepError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(StepError::UpstreamUnavailable(format!("YouTube Data API returned {status}")));
        }

        let body: Json = response.json().await.map_err(|e| StepError::UpstreamUnavailable(e.to_string()))?;
        let item = body
            .get("items")
            .and_then(|v| v.as_array())
            .and_then(|items| items.first())
            .ok_or_else(|| StepError::NotFound(format!("video not found: {video_id}")))?;

        let snippet = item.get("snippet").cloned().unwrap_or(Json::Null);
        let statistics = item.get("statistics").cloned().unwrap_or(Json::Null);
        let content_details = item.get("contentDetails").cloned().unwrap_or(Json::Null);

        let duration_iso = content_details.get("duration").and_then(|v| v.as_str()).unwrap_or("PT0S");

        let mut metadata = HashMap::new();
        metadata.insert("video_id".to_string(), Json::String(video_id.to_string()));
        metadata.insert("title".to_string(), snippet.get("title").cloned().unwrap_or(Json::Null));
        metadata.insert("description".to_string(), snippet.get("description").cloned().unwrap_or(Json::Null));
        metadata.insert("published_at".to_string(), snippet.get("publishedAt").cloned().unwrap_or(Json::Null));
        metadata.insert("channel_id".to_string(), snippet.get("channelId").cloned().unwrap_or(Json::Null));
        metadata.insert("channel_title".to_string(), snippet.get("channelTitle").cloned().unwrap_or(Json::Null));
        metadata.insert("tags".to_string(), snippet.get("tags").cloned().unwrap_or(Json::Array(vec![])));
        metadata.insert("duration_seconds".to_string(), Json::from(parse_iso8601_duration_seconds(duration_iso)));
        metadata.insert(
            "view_count".to_string(),
            statistics
                .get("viewCount")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Json::from)
                .unwrap_or(Json::from(0)),
        );
        Ok(metadata)
    }
}

/// Parse an ISO-8601 duration (`PT1H2M3S`) into whole seconds, matching
/// `YouTubeMetadataService._parse_duration_to_seconds`.
fn parse_iso8601_duration_seconds(duration: &str) -> u64 {
    let mut hours = 0u64;
    let mut minutes = 0u64;
    let mut seconds = 0u64;
    let mut number = String::new();

    for c in duration.chars() {
        match c {
            'P' | 'T' => continue,
            '0'..='9' => number.push(c),
            'H' => {
                hours = number.parse().unwrap_or(0);
                number.clear();
            }
            'M' => {
                minutes = number.parse().unwrap_or(0);
                number.clear();
            }
            'S' => {
                seconds = number.parse().unwrap_or(0);
                number.clear();
            }
            _ => number.clear(),
        }
    }
    hours * 3600 + minutes * 60 + seconds
}

/// Chat-completions-style LLM client for `generate_tags`, grounded on
/// `vclip-worker/src/gemini.rs`'s JSON-mode request/response shape,
/// generalized to an OpenAI/Anthropic-compatible `/chat/completions`
/// endpoint per `LLM_URL`/`LLM_MODEL`/`LLM_API_KEY` (spec §6).
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), api_key: api_key.into(), model: model.into() }
    }

    pub fn from_env() -> StepResult<Self> {
        let base_url = std::env::var("LLM_URL").unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "claude-haiku".to_string());
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| StepError::InvalidInput("LLM_API_KEY is not set".to_string()))?;
        Ok(Self::new(base_url, api_key, model))
    }
}

#[derive(Debug, serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(rename = "response_format")]
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, serde::Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct TagsJson {
    #[serde(default)]
    tags: Vec<String>,
}

const TAGGING_PROMPT: &str = "Extract 3-8 short topic tags for this video transcript. \
Respond with JSON: {\"tags\": [\"tag1\", \"tag2\"]}.\n\nTranscript:\n";

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate_tags(&self, transcript: &str) -> StepResult<TagsGeneration> {
        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let prompt = format!("{TAGGING_PROMPT}{transcript}");
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StepError::UpstreamUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StepError::RateLimited("LLM tagging request rate-limited".to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(StepError::UpstreamUnavailable(format!("LLM request returned {status}")));
        }

        let parsed: ChatResponse =
            response.json().await.map_err(|e| StepError::UpstreamUnavailable(e.to_string()))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| StepError::UpstreamUnavailable("LLM response had no choices".to_string()))?;
        let tags_json: TagsJson = serde_json::from_str(&content)
            .map_err(|e| StepError::UpstreamUnavailable(format!("could not parse tags JSON: {e}")))?;

        Ok(TagsGeneration {
            tags: tags_json.tags,
            model: self.model.clone(),
            cost_usd: None,
            prompt_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn transcript_fetcher_parses_timed_cues() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transcript"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "hello world",
                "cues": [{"text": "hello", "start": 0.0, "duration": 1.5}, {"text": "world", "start": 1.5, "duration": 1.0}],
            })))
            .mount(&server)
            .await;

        let fetcher = HttpTranscriptFetcher::new(server.uri());
        let result = fetcher.fetch_transcript("https://youtu.be/abc").await.unwrap();
        assert_eq!(result.text, "hello world");
        assert_eq!(result.timed.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transcript_fetcher_404_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transcript"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpTranscriptFetcher::new(server.uri());
        let err = fetcher.fetch_transcript("https://youtu.be/missing").await.unwrap_err();
        assert!(matches!(err, StepError::TranscriptUnavailable(_)));
    }

    #[test]
    fn duration_parsing_matches_reference_examples() {
        assert_eq!(parse_iso8601_duration_seconds("PT15M33S"), 933);
        assert_eq!(parse_iso8601_duration_seconds("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration_seconds("PT0S"), 0);
    }
}
