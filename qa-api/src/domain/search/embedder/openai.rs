//! Embedder for OpenAI-compatible `/embeddings` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingSettings;
use crate::domain::search::traits::{Embedder, Result, SearchError};

pub const DEFAULT_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_DIMENSIONS: usize = 2000;

/// Embedder that calls an OpenAI-compatible embeddings API over HTTP.
///
/// Every request is bounded by the configured timeout. Failures are returned
/// as [`SearchError::Embedding`] and never retried.
///
/// # Example
///
/// ```ignore
/// let embedder = OpenAiEmbedder::new(&settings.embedding)?;
/// let embedding = embedder.embed("how to debounce in react").await?;
/// assert_eq!(embedding.len(), 2000);
/// ```
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| SearchError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", settings.api_base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
            encoding_format: "float",
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Embedding("Embedding request timed out".into())
            } else {
                SearchError::Embedding(e.to_string())
            }
        })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SearchError::Embedding(
                    "Embedding provider rejected the credentials".into(),
                ));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SearchError::Embedding(
                    "Embedding provider rate limit exceeded".into(),
                ));
            }
            status => {
                let detail = response.text().await.unwrap_or_default();
                return Err(SearchError::Embedding(format!(
                    "Embedding provider returned {status}: {detail}"
                )));
            }
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Embedding(format!("Malformed embedding response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(SearchError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);

        parsed
            .data
            .into_iter()
            .enumerate()
            .map(|(position, item)| {
                if item.index != position {
                    return Err(SearchError::Embedding(format!(
                        "Missing embedding for input {position}"
                    )));
                }
                if item.embedding.len() != self.dimensions {
                    return Err(SearchError::Embedding(format!(
                        "Expected {} dimensions, got {}",
                        self.dimensions,
                        item.embedding.len()
                    )));
                }
                Ok(item.embedding)
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
