//! Embedding providers.
//!
//! [`EmbeddingClient`] talks to any OpenAI-compatible `/embeddings` endpoint.
//! Retrieval only depends on the [`EmbeddingProvider`] trait, so tests and
//! local models can plug in their own implementation.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sift_core::{EmbeddingConfig, SiftError};

const OPENAI_PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const BASE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Turns texts into dense vectors.
///
/// Implementations must return exactly one vector per input text, in input
/// order.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, SiftError>> + Send;
}

/// Client for OpenAI-compatible embedding APIs.
///
/// # Examples
///
/// ```
/// use sift_codelens::embedding::EmbeddingClient;
///
/// let client = EmbeddingClient::new("test-key");
/// assert_eq!(client.model(), "text-embedding-3-small");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbeddingClient {
    /// Create a client for the default endpoint and model.
    pub fn new(api_key: &str) -> Self {
        let defaults = EmbeddingConfig::default();
        Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: defaults.model,
            max_retries: defaults.max_retries,
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// The API key comes from the config, then `SIFT_EMBEDDING_API_KEY`, then
    /// `OPENAI_API_KEY`. A key is optional when a custom `base_url` is set,
    /// since local servers usually need none.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::Config`] if the provider is not `openai`, no API
    /// key is available for the default endpoint, or the HTTP client cannot
    /// be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use sift_core::EmbeddingConfig;
    /// use sift_codelens::embedding::EmbeddingClient;
    ///
    /// let config = EmbeddingConfig {
    ///     base_url: Some("http://localhost:11434/v1".into()),
    ///     model: "nomic-embed-text".into(),
    ///     ..EmbeddingConfig::default()
    /// };
    /// let client = EmbeddingClient::with_config(&config).unwrap();
    /// assert_eq!(client.model(), "nomic-embed-text");
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, SiftError> {
        if !config.provider.eq_ignore_ascii_case(OPENAI_PROVIDER) {
            return Err(SiftError::Config(format!(
                "unsupported embedding provider '{}': use \"openai\" and point base_url at any OpenAI-compatible server",
                config.provider
            )));
        }

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("SIFT_EMBEDDING_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() && config.base_url.is_none() {
            return Err(SiftError::Config(
                "embedding API key not found: set embedding.api_key in .sift.toml, SIFT_EMBEDDING_API_KEY or OPENAI_API_KEY, or use --lexical-only".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SiftError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, texts: &'a [String]) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.model,
            // the API rejects empty strings
            input: texts
                .iter()
                .map(|t| if t.is_empty() { " " } else { t.as_str() })
                .collect(),
        }
    }

    /// One request, no retries.
    async fn request_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SiftError> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&self.build_request(texts));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SiftError::embedding_retryable(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            let message = format!("embedding API returned {status}: {body}");
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                SiftError::embedding_retryable(message)
            } else {
                SiftError::embedding(message)
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SiftError::embedding_retryable(format!("failed to read response: {e}")))?;
        parse_response(&body, texts.len())
    }
}

impl EmbeddingProvider for EmbeddingClient {
    /// Embed `texts` in a single request, retrying transient failures.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SiftError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        with_backoff(self.max_retries, BASE_RETRY_DELAY, || self.request_once(texts)).await
    }
}

fn parse_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, SiftError> {
    let mut response: EmbedResponse = serde_json::from_str(body)
        .map_err(|e| SiftError::embedding(format!("failed to parse response: {e}")))?;

    if response.data.len() != expected {
        return Err(SiftError::embedding(format!(
            "expected {expected} embeddings, got {}",
            response.data.len()
        )));
    }
    if response.data.iter().all(|item| item.index.is_some()) {
        response.data.sort_by_key(|item| item.index);
    }

    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}

/// Run `op` until it succeeds, fails with a non-retryable error, or has been
/// retried `max_retries` times. The delay starts at `base_delay` and doubles.
pub async fn with_backoff<T, F, Fut>(
    max_retries: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, SiftError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SiftError>>,
{
    let mut delay = base_delay;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(attempt, max_retries, delay_ms = delay.as_millis() as u64, error = %e, "retrying embedding request");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}
