//! Build command handler.
//!
//! Loads extracted chunk files and publishes a new index generation.

use super::{print_json, Corpus};
use clap::Args;
use docqa_core::{config::AppConfig, AppResult};
use docqa_knowledge::{load_candidates, IndexBuilder};
use std::path::PathBuf;

/// Build the corpus index from extracted chunk files
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Chunk files (.json, .txt, .md) or directories containing them
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Building corpus '{}'", config.corpus);
        tracing::debug!("Build options: {:?}", self);

        let corpus = Corpus::open_for_build(config)?;
        let candidates = load_candidates(&self.paths)?;

        let report = IndexBuilder::new(corpus.layout.clone())
            .build(candidates, corpus.provider.as_ref())
            .await?;

        // Queries must embed with what the index was built with.
        corpus.config.save(corpus.layout.root())?;

        if self.json {
            return print_json(&serde_json::json!({
                "corpus": config.corpus,
                "report": report,
            }));
        }

        println!(
            "Indexed {} chunks into corpus '{}' ({} dims, {}/{}, {:.2}s)",
            report.chunk_count,
            config.corpus,
            report.dimensions,
            report.embedding_provider,
            report.embedding_model,
            report.duration_secs
        );
        println!("Generation: {}", report.generation);

        if !report.skipped.is_empty() {
            println!("Skipped {} blank candidate(s):", report.skipped.len());
            for skipped in &report.skipped {
                println!(
                    "  #{} ({}, position {})",
                    skipped.input_position,
                    skipped.source.as_deref().unwrap_or("unknown source"),
                    skipped.order
                );
            }
        }

        Ok(())
    }
}
