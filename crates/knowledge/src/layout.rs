//! On-disk layout of a corpus index directory.
//!
//! ```text
//! <root>/
//!   config.yaml          corpus settings (embedding provider)
//!   index.lock           held by a builder for the whole rebuild
//!   CURRENT              id of the live generation
//!   gen-<id>/
//!     chunks.json        chunk store
//!     vectors.bin        vector index
//!     manifest.json      build metadata
//! ```
//!
//! A generation directory is written completely before `CURRENT` is
//! repointed at it, and never modified afterwards.

use chrono::{DateTime, Utc};
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CHUNKS_FILE: &str = "chunks.json";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const CURRENT_FILE: &str = "CURRENT";
pub const LOCK_FILE: &str = "index.lock";

const GENERATION_PREFIX: &str = "gen-";
const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Paths of one corpus index directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLayout {
    root: PathBuf,
}

/// Files of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPaths {
    pub id: String,
    pub dir: PathBuf,
    pub chunks: PathBuf,
    pub vectors: PathBuf,
    pub manifest: PathBuf,
}

impl IndexLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    pub fn generation(&self, id: &str) -> GenerationPaths {
        let dir = self.root.join(format!("{}{}", GENERATION_PREFIX, id));
        GenerationPaths {
            id: id.to_string(),
            chunks: dir.join(CHUNKS_FILE),
            vectors: dir.join(VECTORS_FILE),
            manifest: dir.join(MANIFEST_FILE),
            dir,
        }
    }

    /// Id of the live generation, or `None` if nothing was ever built.
    pub fn current_generation(&self) -> AppResult<Option<String>> {
        let path = self.current_path();
        if !path.exists() {
            return Ok(None);
        }

        let id = fs::read_to_string(&path)?.trim().to_string();
        if id.is_empty() || id.contains(['/', '\\']) {
            return Err(AppError::corrupt(path, "invalid generation pointer"));
        }
        Ok(Some(id))
    }

    /// Paths of the live generation; `NotFound` when there is none.
    pub fn require_current(&self) -> AppResult<GenerationPaths> {
        match self.current_generation()? {
            Some(id) => Ok(self.generation(&id)),
            None => Err(AppError::NotFound {
                what: "index (no CURRENT generation)",
                path: self.current_path(),
            }),
        }
    }

    /// Atomically repoint `CURRENT` at `id`.
    pub fn publish(&self, id: &str) -> AppResult<()> {
        let tmp = self.root.join(format!("{}.tmp", CURRENT_FILE));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(id.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.current_path())?;
        tracing::debug!("Published generation {} in {:?}", id, self.root);
        Ok(())
    }

    /// Ids of every generation directory present, in name order.
    pub fn generation_ids(&self) -> AppResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix(GENERATION_PREFIX))
                    .map(str::to_string)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Remove every generation not named in `keep`. Failures are logged only.
    pub fn prune_generations(&self, keep: &[&str]) -> usize {
        let ids = match self.generation_ids() {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Could not list generations in {:?}: {}", self.root, e);
                return 0;
            }
        };

        let mut removed = 0;
        for id in ids.iter().filter(|id| !keep.contains(&id.as_str())) {
            let dir = self.generation(id).dir;
            match fs::remove_dir_all(&dir) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove old generation {:?}: {}", dir, e),
            }
        }
        removed
    }

    /// Statistics of the live generation, read from its manifest.
    pub fn stats(&self) -> AppResult<IndexStats> {
        let generation = self.require_current()?;
        let manifest = IndexManifest::load(&generation.manifest)?;

        let bytes_on_disk = [&generation.chunks, &generation.vectors, &generation.manifest]
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();

        Ok(IndexStats {
            generation: generation.id,
            chunk_count: manifest.chunk_count,
            skipped_count: manifest.skipped_count,
            dimensions: manifest.dimensions,
            embedding_provider: manifest.embedding_provider,
            embedding_model: manifest.embedding_model,
            built_at: manifest.built_at,
            bytes_on_disk,
            sources: manifest.sources,
        })
    }
}

/// Build metadata stored next to each index pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub generation: String,
    pub chunk_count: usize,
    pub skipped_count: usize,
    pub dimensions: usize,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub built_at: DateTime<Utc>,
    /// Chunk count per source document ("" for chunks without a source)
    pub sources: BTreeMap<String, usize>,
}

impl IndexManifest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generation: &str,
        chunk_count: usize,
        skipped_count: usize,
        dimensions: usize,
        embedding_provider: &str,
        embedding_model: &str,
        sources: BTreeMap<String, usize>,
    ) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            generation: generation.to_string(),
            chunk_count,
            skipped_count,
            dimensions,
            embedding_provider: embedding_provider.to_string(),
            embedding_model: embedding_model.to_string(),
            built_at: Utc::now(),
            sources,
        }
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::NotFound {
                what: "index manifest",
                path: path.to_path_buf(),
            });
        }
        let bytes = fs::read(path)?;
        let manifest: Self = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::corrupt(path, format!("malformed manifest: {}", e)))?;
        if manifest.format_version != MANIFEST_FORMAT_VERSION {
            return Err(AppError::corrupt(
                path,
                format!(
                    "unsupported manifest version {} (expected {})",
                    manifest.format_version, MANIFEST_FORMAT_VERSION
                ),
            ));
        }
        Ok(manifest)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let mut file = fs::File::create(path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }
}

/// Summary of the live index, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub generation: String,
    pub chunk_count: usize,
    pub skipped_count: usize,
    pub dimensions: usize,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub built_at: DateTime<Utc>,
    pub bytes_on_disk: u64,
    pub sources: BTreeMap<String, usize>,
}
