//! Command handlers for the docqa CLI.

pub mod ask;
pub mod build;
pub mod retrieve;
pub mod stats;

pub use ask::AskCommand;
pub use build::BuildCommand;
pub use retrieve::RetrieveCommand;
pub use stats::StatsCommand;

use docqa_core::{config::AppConfig, AppError, AppResult};
use docqa_knowledge::{create_provider, CorpusConfig, EmbeddingProvider, IndexLayout};
use std::path::PathBuf;
use std::sync::Arc;

/// The configured corpus: its settings, index layout and embedding provider.
pub(crate) struct Corpus {
    pub config: CorpusConfig,
    pub layout: IndexLayout,
    pub provider: Arc<dyn EmbeddingProvider>,
}

impl Corpus {
    /// Open for querying, with the embeddings the corpus was built with.
    pub fn open(config: &AppConfig) -> AppResult<Self> {
        let dir = config.corpus_dir();
        let corpus_config =
            CorpusConfig::load(&dir, &config.corpus, &workspace_config_path(config))?;
        Self::with_config(config, corpus_config)
    }

    /// Open for a rebuild, with the embeddings the workspace config asks for.
    pub fn open_for_build(config: &AppConfig) -> AppResult<Self> {
        let dir = config.corpus_dir();
        let corpus_config =
            CorpusConfig::load_for_build(&dir, &config.corpus, &workspace_config_path(config))?;
        Self::with_config(config, corpus_config)
    }

    fn with_config(config: &AppConfig, corpus_config: CorpusConfig) -> AppResult<Self> {
        let dir = config.corpus_dir();
        let provider = create_provider(&corpus_config.embedding)?;

        tracing::debug!(
            "Corpus '{}' at {:?} embeds with {}/{}",
            config.corpus,
            dir,
            provider.provider_name(),
            provider.model_name()
        );

        Ok(Self {
            config: corpus_config,
            layout: IndexLayout::new(dir),
            provider,
        })
    }
}

fn workspace_config_path(config: &AppConfig) -> PathBuf {
    config
        .config_file
        .clone()
        .unwrap_or_else(|| config.docqa_dir().join("config.yaml"))
}

pub(crate) fn print_json(value: &serde_json::Value) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
