//! Chunk store: the ordered, JSON-persisted side of an index pair.

use crate::types::{Chunk, ChunkCandidate, SkippedCandidate};
use docqa_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Ordered chunk sequence where `chunks[i].id == i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    /// Number candidates in presentation order, dropping blank ones.
    ///
    /// Dropped candidates are returned so callers can report them; they
    /// never receive an id, which keeps ids aligned with vector positions.
    pub fn from_candidates(candidates: Vec<ChunkCandidate>) -> (Self, Vec<SkippedCandidate>) {
        let mut chunks = Vec::with_capacity(candidates.len());
        let mut skipped = Vec::new();

        for (input_position, candidate) in candidates.into_iter().enumerate() {
            if !candidate.is_indexable() {
                tracing::debug!(
                    "Skipping blank candidate {} (source: {:?}, order: {})",
                    input_position,
                    candidate.source,
                    candidate.order
                );
                skipped.push(SkippedCandidate {
                    input_position,
                    source: candidate.source,
                    order: candidate.order,
                });
                continue;
            }

            chunks.push(Chunk {
                id: chunks.len(),
                text: candidate.text,
                source: candidate.source,
                page: candidate.page,
                order: candidate.order,
            });
        }

        (Self { chunks }, skipped)
    }

    /// Build a store from already-numbered chunks, validating every record.
    pub fn from_chunks(chunks: Vec<Chunk>) -> AppResult<Self> {
        validate_sequence(&chunks).map_err(AppError::InvalidChunk)?;
        Ok(Self { chunks })
    }

    /// Load a store from its JSON file.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::NotFound {
                what: "chunk store",
                path: path.to_path_buf(),
            });
        }

        let bytes = fs::read(path)?;
        let chunks: Vec<Chunk> = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::corrupt(path, format!("malformed chunk record: {}", e)))?;

        validate_sequence(&chunks).map_err(|reason| AppError::corrupt(path, reason))?;

        tracing::debug!("Loaded {} chunks from {:?}", chunks.len(), path);
        Ok(Self { chunks })
    }

    /// Write the store to `path` as pretty-printed UTF-8 JSON and fsync it.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        validate_sequence(&self.chunks).map_err(AppError::InvalidChunk)?;

        let bytes = serde_json::to_vec_pretty(&self.chunks)?;
        let mut file = fs::File::create(path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        tracing::debug!("Saved {} chunks to {:?}", self.chunks.len(), path);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Texts in store order, ready for a batched embedding call.
    pub fn texts(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.text.clone()).collect()
    }

    /// Chunk count per source; chunks without a source are counted under "".
    pub fn source_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for chunk in &self.chunks {
            *counts
                .entry(chunk.source.clone().unwrap_or_default())
                .or_insert(0) += 1;
        }
        counts
    }
}

/// Check `id == position` and non-blank text for every record.
fn validate_sequence(chunks: &[Chunk]) -> Result<(), String> {
    for (position, chunk) in chunks.iter().enumerate() {
        if chunk.id != position {
            return Err(format!(
                "chunk ids must be contiguous from 0: found id {} at position {}",
                chunk.id, position
            ));
        }
        if chunk.text.trim().is_empty() {
            return Err(format!("chunk {} has blank text", chunk.id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn candidates() -> Vec<ChunkCandidate> {
        vec![
            ChunkCandidate::new("Cells divide by mitosis.", Some("bio.pdf".into()), Some(1), 0),
            ChunkCandidate::new("   ", Some("bio.pdf".into()), Some(1), 1),
            ChunkCandidate::new("Meiosis halves chromosomes.", Some("bio.pdf".into()), Some(2), 2),
            ChunkCandidate::new("Photosynthesis 光合作用", Some("plants.pdf".into()), None, 0),
        ]
    }

    #[test]
    fn test_from_candidates_numbers_survivors() {
        let (store, skipped) = ChunkStore::from_candidates(candidates());

        assert_eq!(store.len(), 3);
        let ids: Vec<usize> = store.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(store.get(1).unwrap().order, 2);

        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].input_position, 1);
        assert_eq!(skipped[0].order, 1);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");
        let (store, _) = ChunkStore::from_candidates(candidates());

        store.save(&path).unwrap();
        let loaded = ChunkStore::load(&path).unwrap();

        assert_eq!(loaded, store);
        // Non-ASCII text is stored as-is, not escaped
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("光合作用"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = ChunkStore::load(&temp.path().join("chunks.json")).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn test_load_non_contiguous_ids() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");
        fs::write(
            &path,
            r#"[
                {"id": 0, "text": "A", "source": "a.pdf", "page": 1, "order": 0},
                {"id": 1, "text": "B", "source": "a.pdf", "page": 1, "order": 1},
                {"id": 3, "text": "C", "source": "a.pdf", "page": 2, "order": 2}
            ]"#,
        )
        .unwrap();

        let err = ChunkStore::load(&path).unwrap_err();
        assert!(matches!(err, AppError::CorruptData { .. }));
        assert!(err.to_string().contains("found id 3 at position 2"));
    }

    #[test]
    fn test_load_missing_required_field() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");
        fs::write(&path, r#"[{"id": 0, "source": "a.pdf", "page": 1, "order": 0}]"#).unwrap();

        let err = ChunkStore::load(&path).unwrap_err();
        assert!(matches!(err, AppError::CorruptData { .. }));
    }

    #[test]
    fn test_load_wrong_type() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");
        fs::write(&path, r#"[{"id": "zero", "text": "A", "order": 0}]"#).unwrap();

        let err = ChunkStore::load(&path).unwrap_err();
        assert!(matches!(err, AppError::CorruptData { .. }));
    }

    #[test]
    fn test_load_blank_text_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");
        fs::write(&path, r#"[{"id": 0, "text": "  ", "order": 0}]"#).unwrap();

        let err = ChunkStore::load(&path).unwrap_err();
        assert!(matches!(err, AppError::CorruptData { .. }));
    }

    #[test]
    fn test_from_chunks_rejects_misnumbered() {
        let chunk = Chunk::new(4, "A", None, None, 0).unwrap();
        let err = ChunkStore::from_chunks(vec![chunk]).unwrap_err();
        assert!(matches!(err, AppError::InvalidChunk(_)));
    }

    #[test]
    fn test_source_counts() {
        let (store, _) = ChunkStore::from_candidates(candidates());
        let counts = store.source_counts();
        assert_eq!(counts.get("bio.pdf"), Some(&2));
        assert_eq!(counts.get("plants.pdf"), Some(&1));
    }
}
