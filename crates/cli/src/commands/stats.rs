//! Stats command handler.

use super::{print_json, Corpus};
use clap::Args;
use docqa_core::{config::AppConfig, AppResult};

/// Show statistics of the corpus index
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let corpus = Corpus::open(config)?;
        let stats = corpus.layout.stats()?;

        if self.json {
            return print_json(&serde_json::json!({
                "corpus": config.corpus,
                "stats": stats,
            }));
        }

        println!("Corpus:      {}", config.corpus);
        println!("Generation:  {}", stats.generation);
        println!("Built at:    {}", stats.built_at.to_rfc3339());
        println!("Chunks:      {} ({} skipped)", stats.chunk_count, stats.skipped_count);
        println!("Dimensions:  {}", stats.dimensions);
        println!(
            "Embeddings:  {}/{}",
            stats.embedding_provider, stats.embedding_model
        );
        println!("Size:        {} bytes", stats.bytes_on_disk);

        if !stats.sources.is_empty() {
            println!("Sources:");
            for (source, count) in &stats.sources {
                let name = if source.is_empty() { "(none)" } else { source.as_str() };
                println!("  {:>6}  {}", count, name);
            }
        }
        Ok(())
    }
}
