//! Ask command handler.
//!
//! Retrieves context for a question, renders the answer prompt and sends it
//! to the configured LLM.

use super::print_json;
use super::retrieve::retrieve_context;
use clap::Args;
use docqa_core::{config::AppConfig, AppResult};
use docqa_knowledge::{assemble, render, RetrievalResult};
use docqa_llm::{create_client, LlmClient, LlmRequest, LlmUsage};
use docqa_prompt::{build_answer_prompt, load_answer_prompt, BuiltPromptMetadata};
use futures::StreamExt;
use std::io::Write;

/// Answer a question from the corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question
    pub question: String,

    /// Number of chunks to use as context
    #[arg(short = 'k', long = "top-k")]
    pub top_k: Option<usize>,

    /// Stream the answer as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Maximum tokens in response
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Temperature for response generation
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let k = self.top_k.unwrap_or(config.top_k);
        let result = retrieve_context(config, &self.question, k).await?;

        if !self.json {
            println!("Retrieved context:");
            println!("{}", render(&result));
            println!();
        }

        let definition = load_answer_prompt(&config.docqa_dir())?;
        let built = build_answer_prompt(&definition, &self.question, &assemble(&result))?;
        tracing::debug!(
            "Built prompt '{}' with {} context chars",
            built.metadata.source_prompt_id,
            built.metadata.context_chars
        );

        let client = create_client(&config.provider, config.active_provider_config())?;

        let mut request = LlmRequest::new(built.user, &config.model);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let (answer, usage) = if self.stream {
            self.stream_answer(client.as_ref(), &request).await?
        } else {
            let response = client.complete(&request).await?;
            if !self.json {
                println!("Answer:");
                println!("{}", response.content);
            }
            (response.content, Some(response.usage))
        };

        if let Some(usage) = usage {
            tracing::debug!(
                "Token usage - Prompt: {}, Completion: {}, Total: {}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        if self.json {
            self.print_json_answer(config, &result, &built.metadata, &answer, usage)?;
        }
        Ok(())
    }

    async fn stream_answer(
        &self,
        client: &dyn LlmClient,
        request: &LlmRequest,
    ) -> AppResult<(String, Option<LlmUsage>)> {
        let mut stream = client.stream(request).await?;
        let mut answer = String::new();
        let mut usage = None;

        if !self.json {
            println!("Answer:");
        }

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.content.is_empty() {
                answer.push_str(&chunk.content);
                if !self.json {
                    print!("{}", chunk.content);
                    std::io::stdout().flush().ok();
                }
            }
            if chunk.done {
                usage = chunk.usage;
                break;
            }
        }

        if !self.json {
            println!();
        }
        Ok((answer, usage))
    }

    fn print_json_answer(
        &self,
        config: &AppConfig,
        result: &RetrievalResult,
        metadata: &BuiltPromptMetadata,
        answer: &str,
        usage: Option<LlmUsage>,
    ) -> AppResult<()> {
        let usage = usage.unwrap_or_default();
        print_json(&serde_json::json!({
            "question": self.question,
            "answer": answer,
            "corpus": config.corpus,
            "provider": config.provider,
            "model": config.model,
            "context": result,
            "usage": {
                "promptTokens": usage.prompt_tokens,
                "completionTokens": usage.completion_tokens,
                "totalTokens": usage.total_tokens
            },
            "metadata": {
                "promptId": metadata.source_prompt_id,
                "contextChars": metadata.context_chars
            }
        }))
    }
}
