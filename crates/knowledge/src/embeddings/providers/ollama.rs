//! Ollama embedding provider.
//!
//! Uses the batched `/api/embed` endpoint, so one `embed_batch` call is one
//! HTTP request. Transport failures and 5xx responses are retried with
//! exponential backoff; every other failure is returned as
//! `AppError::EmbeddingService`.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use docqa_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBED_ENDPOINT: &str = "/api/embed";

/// Maximum attempts per request
const MAX_ATTEMPTS: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Whether a failed attempt is worth repeating.
enum Attempt {
    Retryable(String),
    Fatal(String),
}

impl OllamaProvider {
    /// Create a provider; `OLLAMA_URL` overrides the configured base URL.
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::EmbeddingService(format!("Failed to create HTTP client: {}", e))
            })?;

        let base_url = std::env::var("OLLAMA_URL")
            .ok()
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    async fn request_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Attempt> {
        let url = format!("{}{}", self.base_url, EMBED_ENDPOINT);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            let message = format!("Ollama API error ({}): {}", status, detail);
            return Err(if status.is_server_error() {
                Attempt::Retryable(message)
            } else {
                Attempt::Fatal(message)
            });
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Attempt::Fatal(format!("failed to parse Ollama response: {}", e)))?;

        Ok(body.embeddings)
    }

    fn validate(&self, texts: &[String], embeddings: &[Vec<f32>]) -> AppResult<()> {
        if embeddings.len() != texts.len() {
            return Err(AppError::EmbeddingService(format!(
                "Ollama returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        if let Some((i, bad)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.len() != self.dimensions)
        {
            return Err(AppError::EmbeddingService(format!(
                "model '{}' returned {} dimensions for text {}, expected {}",
                self.model,
                bad.len(),
                i,
                self.dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request_once(texts).await {
                Ok(embeddings) => {
                    self.validate(texts, &embeddings)?;
                    debug!("Embedded {} texts via Ollama", embeddings.len());
                    return Ok(embeddings);
                }
                Err(Attempt::Retryable(message)) if attempt < MAX_ATTEMPTS => {
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                    warn!(
                        "Embedding request failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, MAX_ATTEMPTS, backoff_ms, message
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(Attempt::Retryable(message)) | Err(Attempt::Fatal(message)) => {
                    return Err(AppError::EmbeddingService(message));
                }
            }
        }
    }
}
