//! Ollama answer-generation client.
//!
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use docqa_core::{AppError, AppResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "GenerateOptions::is_empty")]
    options: GenerateOptions,
    stream: bool,
}

/// Sampling parameters; Ollama reads these from `options`, not the top level.
#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl GenerateOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl GenerateResponse {
    fn usage(&self) -> LlmUsage {
        LlmUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }
}

pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for `base_url` with a request timeout.
    pub fn new(base_url: impl Into<String>, timeout_secs: Option<u64>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_generate_request<'a>(&self, request: &'a LlmRequest, stream: bool) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream,
        }
    }

    async fn send(&self, request: &LlmRequest, stream: bool) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);
        let body = self.to_generate_request(request, stream);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to Ollama ({})", request.model);

        let response: GenerateResponse = self
            .send(request, false)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(AppError::Llm(format!("Ollama error: {}", error)));
        }

        let usage = response.usage();
        tracing::debug!(
            "Completion used {} prompt + {} completion tokens",
            usage.prompt_tokens,
            usage.completion_tokens
        );

        Ok(LlmResponse {
            content: response.response,
            model: response.model,
            usage,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming request to Ollama ({})", request.model);

        let response = self.send(request, true).await?;

        // Network chunks do not align with the newline-delimited JSON records.
        let stream = response
            .bytes_stream()
            .scan(Vec::new(), |buffer, result| {
                let items = match result {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        drain_records(buffer)
                    }
                    Err(e) => vec![Err(AppError::Llm(format!("Stream error: {}", e)))],
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}

/// Parse every complete line in `buffer`, leaving a trailing partial line.
fn drain_records(buffer: &mut Vec<u8>) -> Vec<AppResult<LlmStreamChunk>> {
    let mut records = Vec::new();

    while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline).collect();
        let line = String::from_utf8_lossy(&line);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        records.push(
            serde_json::from_str::<GenerateResponse>(line)
                .map_err(|e| AppError::Llm(format!("Failed to parse chunk: {}", e)))
                .and_then(|chunk| match chunk.error {
                    Some(ref error) => Err(AppError::Llm(format!("Ollama error: {}", error))),
                    None => Ok(LlmStreamChunk {
                        usage: chunk.done.then(|| chunk.usage()),
                        content: chunk.response,
                        done: chunk.done,
                    }),
                }),
        );
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_base_url() {
        let client = OllamaClient::new("http://gpu-box:11434/", None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url(), "http://gpu-box:11434");
    }

    #[test]
    fn test_sampling_goes_into_options() {
        let client = OllamaClient::new(DEFAULT_OLLAMA_URL, None).unwrap();
        let request = LlmRequest::new("Hello", "llama3.2")
            .with_temperature(0.5)
            .with_max_tokens(100);

        let body = serde_json::to_value(client.to_generate_request(&request, false)).unwrap();
        assert_eq!(body["options"]["temperature"], 0.5);
        assert_eq!(body["options"]["num_predict"], 100);
        assert!(body.get("temperature").is_none());
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_options_omitted_when_unset() {
        let client = OllamaClient::new(DEFAULT_OLLAMA_URL, None).unwrap();
        let request = LlmRequest::new("Hello", "llama3.2");
        let body = serde_json::to_value(client.to_generate_request(&request, true)).unwrap();
        assert!(body.get("options").is_none());
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_drain_records_keeps_partial_line() {
        let mut buffer = br#"{"model":"m","response":"Mito","done":false}
{"model":"m","response":"chon"#
            .to_vec();

        let records = drain_records(&mut buffer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_ref().unwrap().content, "Mito");

        buffer.extend_from_slice(
            b"dria\",\"done\":false}\n{\"model\":\"m\",\"response\":\"\",\"done\":true,\"prompt_eval_count\":7,\"eval_count\":3}\n",
        );
        let records = drain_records(&mut buffer);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap().content, "chondria");
        let last = records[1].as_ref().unwrap();
        assert!(last.done);
        assert_eq!(last.usage, Some(LlmUsage::new(7, 3)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_records_reports_server_error() {
        let mut buffer = b"{\"error\":\"model not found\"}\n".to_vec();
        let records = drain_records(&mut buffer);
        assert!(matches!(records[0], Err(AppError::Llm(_))));
    }
}
