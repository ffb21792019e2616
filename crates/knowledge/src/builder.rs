//! Index construction.
//!
//! A build turns an ordered candidate list into a new generation: chunk
//! store, vector index and manifest, written into a staging directory and
//! published by swapping the `CURRENT` pointer. Readers keep seeing the
//! previous generation until the swap.

use crate::embeddings::EmbeddingProvider;
use crate::layout::{GenerationPaths, IndexLayout, IndexManifest};
use crate::lock::acquire_write_lock;
use crate::store::ChunkStore;
use crate::types::{ChunkCandidate, SkippedCandidate};
use crate::vector_index::VectorIndex;
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a successful build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub generation: String,
    pub chunk_count: usize,
    pub skipped: Vec<SkippedCandidate>,
    pub dimensions: usize,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub duration_secs: f64,
}

#[derive(Debug, Clone)]
pub struct IndexBuilder {
    layout: IndexLayout,
}

impl IndexBuilder {
    pub fn new(layout: IndexLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    /// Build and publish a new generation from `candidates`.
    ///
    /// Holds the corpus write lock for the whole call. On error nothing is
    /// published and the previous generation, if any, stays current.
    pub async fn build(
        &self,
        candidates: Vec<ChunkCandidate>,
        provider: &dyn EmbeddingProvider,
    ) -> AppResult<BuildReport> {
        let start = Instant::now();
        let _lock = acquire_write_lock(self.layout.lock_path()).await?;

        let candidate_count = candidates.len();
        let (store, skipped) = ChunkStore::from_candidates(candidates);
        if store.is_empty() {
            return Err(AppError::EmptyIndex(format!(
                "none of the {} candidates has indexable text",
                candidate_count
            )));
        }
        info!(
            "Indexing {} chunks ({} skipped) with {}/{}",
            store.len(),
            skipped.len(),
            provider.provider_name(),
            provider.model_name()
        );

        let texts = store.texts();
        let vectors = provider
            .embed_batch(&texts)
            .await
            .map_err(|e| match e {
                AppError::EmbeddingService(_) => e,
                other => AppError::EmbeddingService(other.to_string()),
            })?;
        if vectors.len() != texts.len() {
            return Err(AppError::EmbeddingService(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }

        let index = VectorIndex::build(vectors)?;
        debug!("Built vector index: {} x {}", index.len(), index.dimensions());

        let generation_id = uuid::Uuid::new_v4().simple().to_string();
        let generation = self.layout.generation(&generation_id);
        let manifest = IndexManifest::new(
            &generation_id,
            store.len(),
            skipped.len(),
            index.dimensions(),
            provider.provider_name(),
            provider.model_name(),
            store.source_counts(),
        );

        if let Err(e) = self.write_generation(&generation, &store, &index, &manifest) {
            discard_staging(&generation);
            return Err(e);
        }
        let previous = match self.layout.current_generation() {
            Ok(previous) => previous,
            Err(e) => {
                warn!("Ignoring unreadable generation pointer: {}", e);
                None
            }
        };
        if let Err(e) = self.layout.publish(&generation_id) {
            discard_staging(&generation);
            return Err(e);
        }

        // Readers that resolved the old pointer may still be loading it.
        let mut keep = vec![generation_id.as_str()];
        keep.extend(previous.as_deref());
        let pruned = self.layout.prune_generations(&keep);
        if pruned > 0 {
            debug!("Removed {} superseded generation(s)", pruned);
        }

        let duration = start.elapsed();
        info!(
            "Published generation {} ({} chunks, {} dims) in {:.2}s",
            generation_id,
            store.len(),
            index.dimensions(),
            duration.as_secs_f64()
        );

        Ok(BuildReport {
            generation: generation_id,
            chunk_count: store.len(),
            skipped,
            dimensions: index.dimensions(),
            embedding_provider: provider.provider_name().to_string(),
            embedding_model: provider.model_name().to_string(),
            duration_secs: duration.as_secs_f64(),
        })
    }

    fn write_generation(
        &self,
        generation: &GenerationPaths,
        store: &ChunkStore,
        index: &VectorIndex,
        manifest: &IndexManifest,
    ) -> AppResult<()> {
        fs::create_dir_all(&generation.dir)?;
        store.save(&generation.chunks)?;
        index.save(&generation.vectors)?;
        manifest.save(&generation.manifest)?;
        Ok(())
    }
}

fn discard_staging(generation: &GenerationPaths) {
    if generation.dir.exists() {
        if let Err(e) = fs::remove_dir_all(&generation.dir) {
            warn!(
                "Failed to remove staging directory {:?}: {}",
                generation.dir, e
            );
        }
    }
}
