//! Retrieve command handler.

use super::{print_json, Corpus};
use clap::Args;
use docqa_core::{config::AppConfig, AppResult};
use docqa_knowledge::{render, RetrievalResult, Retriever};

/// Show the chunks most relevant to a question
#[derive(Args, Debug)]
pub struct RetrieveCommand {
    /// The question
    pub question: String,

    /// Number of chunks to return
    #[arg(short = 'k', long = "top-k")]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RetrieveCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing retrieve command");

        let k = self.top_k.unwrap_or(config.top_k);
        let result = retrieve_context(config, &self.question, k).await?;

        if self.json {
            return print_json(&serde_json::json!({
                "question": self.question,
                "corpus": config.corpus,
                "results": result,
            }));
        }

        if result.is_empty() {
            println!("No chunks found.");
        } else {
            println!("{}", render(&result));
        }
        Ok(())
    }
}

/// Open the configured corpus and fetch the `k` chunks nearest to `question`.
pub(crate) async fn retrieve_context(
    config: &AppConfig,
    question: &str,
    k: usize,
) -> AppResult<RetrievalResult> {
    let corpus = Corpus::open(config)?;
    let retriever = Retriever::open(&corpus.layout)?;

    if let Some(manifest) = retriever.manifest() {
        if manifest.embedding_provider != corpus.provider.provider_name()
            || manifest.embedding_model != corpus.provider.model_name()
        {
            tracing::warn!(
                "Corpus '{}' was built with {}/{} but queries use {}/{}; rebuild for meaningful results",
                config.corpus,
                manifest.embedding_provider,
                manifest.embedding_model,
                corpus.provider.provider_name(),
                corpus.provider.model_name()
            );
        }
    }

    retriever
        .retrieve(question, corpus.provider.as_ref(), k)
        .await
}
