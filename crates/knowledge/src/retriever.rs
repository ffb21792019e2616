//! Question-to-chunks retrieval over a loaded index pair.

use crate::embeddings::EmbeddingProvider;
use crate::layout::{GenerationPaths, IndexLayout, IndexManifest};
use crate::store::ChunkStore;
use crate::types::Chunk;
use crate::vector_index::VectorIndex;
use docqa_core::{AppError, AppResult};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, instrument};

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Squared L2 distance to the query
    pub distance: f32,
}

/// Ranked hits, nearest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetrievedChunk> {
        self.chunks.iter()
    }
}

/// Immutable, loaded index pair.
///
/// Every query method takes `&self`; share one instance across tasks with
/// `Arc<Retriever>`.
#[derive(Debug)]
pub struct Retriever {
    store: ChunkStore,
    index: VectorIndex,
    manifest: Option<IndexManifest>,
}

impl Retriever {
    /// Load a chunk store and vector index from explicit paths.
    pub fn load(chunk_store_path: &Path, vector_index_path: &Path) -> AppResult<Self> {
        let store = ChunkStore::load(chunk_store_path)?;
        let index = VectorIndex::load(vector_index_path)?;

        if store.len() != index.len() {
            return Err(AppError::InconsistentIndex(format!(
                "{:?} holds {} chunks but {:?} holds {} vectors",
                chunk_store_path,
                store.len(),
                vector_index_path,
                index.len()
            )));
        }

        debug!(
            "Loaded index pair: {} chunks, {} dimensions",
            store.len(),
            index.dimensions()
        );
        Ok(Self {
            store,
            index,
            manifest: None,
        })
    }

    /// Load the current generation of a corpus and check it against its manifest.
    ///
    /// If the resolved generation is removed by a concurrent rebuild before
    /// its files are read, `CURRENT` is resolved once more.
    pub fn open(layout: &IndexLayout) -> AppResult<Self> {
        let generation = layout.require_current()?;
        Self::open_resolved(layout, generation)
    }

    pub(crate) fn open_resolved(
        layout: &IndexLayout,
        generation: GenerationPaths,
    ) -> AppResult<Self> {
        match Self::open_generation(&generation) {
            Err(e) if !generation.dir.exists() => {
                let latest = layout.require_current()?;
                debug!(
                    "Generation {} vanished while opening ({}), retrying with {}",
                    generation.id, e, latest.id
                );
                Self::open_generation(&latest)
            }
            other => other,
        }
    }

    fn open_generation(generation: &GenerationPaths) -> AppResult<Self> {
        let mut retriever = Self::load(&generation.chunks, &generation.vectors)?;
        let manifest = IndexManifest::load(&generation.manifest)?;

        if manifest.chunk_count != retriever.len() || manifest.dimensions != retriever.dimensions()
        {
            return Err(AppError::InconsistentIndex(format!(
                "manifest of generation {} records {} chunks x {} dims, files hold {} x {}",
                generation.id,
                manifest.chunk_count,
                manifest.dimensions,
                retriever.len(),
                retriever.dimensions()
            )));
        }

        info!(
            "Opened generation {} ({} chunks)",
            generation.id,
            retriever.len()
        );
        retriever.manifest = Some(manifest);
        Ok(retriever)
    }

    /// Embed `question` with `provider` and return the `k` nearest chunks.
    #[instrument(skip(self, question, provider))]
    pub async fn retrieve(
        &self,
        question: &str,
        provider: &dyn EmbeddingProvider,
        k: usize,
    ) -> AppResult<RetrievalResult> {
        let mut vectors = provider
            .embed_batch(&[question.to_string()])
            .await
            .map_err(|e| match e {
                AppError::EmbeddingService(_) => e,
                other => AppError::EmbeddingService(other.to_string()),
            })?;

        if vectors.len() != 1 {
            return Err(AppError::EmbeddingService(format!(
                "provider returned {} vectors for one question",
                vectors.len()
            )));
        }
        let query = vectors.remove(0);
        if query.len() != self.dimensions() {
            return Err(AppError::EmbeddingService(format!(
                "question embedding has {} dimensions, index has {} (model {}/{})",
                query.len(),
                self.dimensions(),
                provider.provider_name(),
                provider.model_name()
            )));
        }

        self.retrieve_vector(&query, k)
    }

    /// Return the `k` nearest chunks to an already-embedded query.
    pub fn retrieve_vector(&self, query: &[f32], k: usize) -> AppResult<RetrievalResult> {
        let neighbors = self.index.search(query, k)?;

        let chunks = neighbors
            .into_iter()
            .map(|neighbor| {
                let chunk = self.store.get(neighbor.position).ok_or_else(|| {
                    AppError::InconsistentIndex(format!(
                        "vector position {} has no chunk (store holds {})",
                        neighbor.position,
                        self.store.len()
                    ))
                })?;
                Ok(RetrievedChunk {
                    chunk: chunk.clone(),
                    distance: neighbor.distance,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        debug!("Retrieved {} chunks", chunks.len());
        Ok(RetrievalResult { chunks })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    /// Manifest of the opened generation; `None` after [`Retriever::load`].
    pub fn manifest(&self) -> Option<&IndexManifest> {
        self.manifest.as_ref()
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkCandidate;
    use tempfile::TempDir;

    fn write_pair(dir: &Path, texts: &[&str], vectors: Vec<Vec<f32>>) {
        let candidates = texts
            .iter()
            .enumerate()
            .map(|(i, t)| ChunkCandidate::new(*t, None, None, i as u32))
            .collect();
        let (store, _) = ChunkStore::from_candidates(candidates);
        store.save(&dir.join("chunks.json")).unwrap();
        VectorIndex::build(vectors)
            .unwrap()
            .save(&dir.join("vectors.bin"))
            .unwrap();
    }

    #[test]
    fn test_retrieve_vector_maps_positions_to_chunks() {
        let temp = TempDir::new().unwrap();
        write_pair(
            temp.path(),
            &["A", "B", "C"],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
        );

        let retriever = Retriever::load(
            &temp.path().join("chunks.json"),
            &temp.path().join("vectors.bin"),
        )
        .unwrap();
        let result = retriever.retrieve_vector(&[0.9, 0.1], 2).unwrap();

        let texts: Vec<&str> = result.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "C"]);
        assert!((result.chunks[0].distance - 0.02).abs() < 1e-5);
        assert!((result.chunks[1].distance - 0.82).abs() < 1e-5);
        assert!(retriever.manifest().is_none());
    }

    #[test]
    fn test_count_mismatch_is_inconsistent() {
        let temp = TempDir::new().unwrap();
        write_pair(temp.path(), &["A", "B", "C"], vec![vec![1.0], vec![2.0]]);

        let err = Retriever::load(
            &temp.path().join("chunks.json"),
            &temp.path().join("vectors.bin"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InconsistentIndex(_)));
    }

    #[test]
    fn test_wrong_query_dimension() {
        let temp = TempDir::new().unwrap();
        write_pair(temp.path(), &["A"], vec![vec![1.0, 0.0]]);
        let retriever = Retriever::load(
            &temp.path().join("chunks.json"),
            &temp.path().join("vectors.bin"),
        )
        .unwrap();

        assert!(matches!(
            retriever.retrieve_vector(&[1.0, 0.0, 0.0], 1).unwrap_err(),
            AppError::DimensionMismatch { .. }
        ));
    }
}
