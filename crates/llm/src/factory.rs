//! LLM client factory.

use crate::client::LlmClient;
use crate::providers::ollama::{OllamaClient, DEFAULT_OLLAMA_URL};
use docqa_core::config::ProviderConfig;
use docqa_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an answer-generation client.
///
/// The endpoint comes from the provider settings, then `OLLAMA_URL`, then
/// the local default.
///
/// # Errors
/// Returns `AppError::Config` for an unknown provider and `AppError::Llm`
/// if the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    settings: Option<&ProviderConfig>,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let endpoint = settings
                .and_then(|s| s.endpoint.clone())
                .or_else(|| std::env::var("OLLAMA_URL").ok())
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            let timeout = settings.and_then(|s| s.timeout);

            tracing::debug!("Using Ollama at {}", endpoint);
            Ok(Arc::new(OllamaClient::new(endpoint, timeout)?))
        }
        other => Err(AppError::Config(format!(
            "Unknown LLM provider: '{}'. Supported providers: ollama",
            other
        ))),
    }
}
