//! Per-corpus configuration.
//!
//! A corpus remembers the embedding settings it was built with in
//! `<corpus>/config.yaml`, so queries embed with the same provider and model.
//! A build takes the `embedding:` section of the workspace config file when
//! there is one; otherwise the stored settings, then built-in defaults.

use crate::embeddings::EmbeddingConfig;
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusConfig {
    pub name: String,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Default, Deserialize)]
struct WorkspaceEmbeddingSection {
    embedding: Option<EmbeddingConfig>,
}

impl CorpusConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            embedding: EmbeddingConfig::default(),
        }
    }

    /// Settings for querying: the config stored in `corpus_dir`, falling
    /// back to the workspace config file, then to defaults.
    ///
    /// Warns when the workspace section names different embeddings than the
    /// stored config, since those only take effect on the next build.
    pub fn load(corpus_dir: &Path, name: &str, workspace_config: &Path) -> AppResult<Self> {
        let workspace = read_workspace_embedding(workspace_config)?;

        if let Some(stored) = read_stored(corpus_dir, name)? {
            if let Some(workspace) = workspace.filter(|w| *w != stored.embedding) {
                tracing::warn!(
                    "Corpus '{}' was built with {}/{} but {:?} sets {}/{}; rebuild to apply it",
                    name,
                    stored.embedding.provider,
                    stored.embedding.model,
                    workspace_config,
                    workspace.provider,
                    workspace.model
                );
            }
            return Ok(stored);
        }

        let mut config = Self::new(name);
        if let Some(embedding) = workspace {
            config.embedding = embedding;
        }
        tracing::debug!(
            "Using {} embeddings for corpus '{}' (no corpus config yet)",
            config.embedding.provider,
            name
        );
        Ok(config)
    }

    /// Settings for a rebuild: the workspace section wins over the stored
    /// config, which wins over defaults.
    pub fn load_for_build(
        corpus_dir: &Path,
        name: &str,
        workspace_config: &Path,
    ) -> AppResult<Self> {
        let stored = read_stored(corpus_dir, name)?;

        let Some(embedding) = read_workspace_embedding(workspace_config)? else {
            return Ok(stored.unwrap_or_else(|| Self::new(name)));
        };

        if let Some(stored) = stored.filter(|s| s.embedding != embedding) {
            tracing::info!(
                "Corpus '{}' switches embeddings from {}/{} to {}/{}",
                name,
                stored.embedding.provider,
                stored.embedding.model,
                embedding.provider,
                embedding.model
            );
        }
        Ok(Self {
            name: name.to_string(),
            embedding,
        })
    }

    pub fn save(&self, corpus_dir: &Path) -> AppResult<()> {
        fs::create_dir_all(corpus_dir)?;
        let yaml = serde_yaml::to_string(self)?;
        fs::write(corpus_dir.join("config.yaml"), yaml)?;
        tracing::debug!("Saved corpus config for '{}'", self.name);
        Ok(())
    }
}

fn read_stored(corpus_dir: &Path, name: &str) -> AppResult<Option<CorpusConfig>> {
    let config_path = corpus_dir.join("config.yaml");
    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&config_path)?;
    let mut config: CorpusConfig = serde_yaml::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse {:?}: {}", config_path, e)))?;
    config.name = name.to_string();
    tracing::debug!("Loaded corpus config for '{}'", name);
    Ok(Some(config))
}

fn read_workspace_embedding(workspace_config: &Path) -> AppResult<Option<EmbeddingConfig>> {
    if !workspace_config.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(workspace_config)?;
    let section: WorkspaceEmbeddingSection = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse {:?}: {}", workspace_config, e))
    })?;
    Ok(section.embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_any_file() {
        let temp = TempDir::new().unwrap();
        let config = CorpusConfig::load(
            &temp.path().join("corpora/biology"),
            "biology",
            &temp.path().join("config.yaml"),
        )
        .unwrap();

        assert_eq!(config.name, "biology");
        assert_eq!(config.embedding, EmbeddingConfig::default());
    }

    #[test]
    fn test_workspace_embedding_section() {
        let temp = TempDir::new().unwrap();
        let workspace_config = temp.path().join("config.yaml");
        fs::write(
            &workspace_config,
            "llm:\n  activeProvider: ollama\nembedding:\n  provider: ollama\n  model: bge-m3\n  dimensions: 1024\n",
        )
        .unwrap();

        let config =
            CorpusConfig::load(&temp.path().join("corpora/x"), "x", &workspace_config).unwrap();
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.dimensions, 1024);
    }

    #[test]
    fn test_corpus_file_wins() {
        let temp = TempDir::new().unwrap();
        let corpus_dir = temp.path().join("corpora/x");
        let workspace_config = temp.path().join("config.yaml");
        fs::write(&workspace_config, "embedding:\n  dimensions: 1024\n").unwrap();

        let mut saved = CorpusConfig::new("x");
        saved.embedding.dimensions = 64;
        saved.save(&corpus_dir).unwrap();

        let loaded = CorpusConfig::load(&corpus_dir, "x", &workspace_config).unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_build_adopts_edited_workspace_section() {
        let temp = TempDir::new().unwrap();
        let corpus_dir = temp.path().join("corpora/x");
        let workspace_config = temp.path().join("config.yaml");

        let mut saved = CorpusConfig::new("x");
        saved.embedding.dimensions = 64;
        saved.save(&corpus_dir).unwrap();
        fs::write(&workspace_config, "embedding:\n  dimensions: 1024\n").unwrap();

        let query = CorpusConfig::load(&corpus_dir, "x", &workspace_config).unwrap();
        assert_eq!(query.embedding.dimensions, 64);

        let build = CorpusConfig::load_for_build(&corpus_dir, "x", &workspace_config).unwrap();
        assert_eq!(build.embedding.dimensions, 1024);
    }

    #[test]
    fn test_build_keeps_stored_without_workspace_section() {
        let temp = TempDir::new().unwrap();
        let corpus_dir = temp.path().join("corpora/x");

        let mut saved = CorpusConfig::new("x");
        saved.embedding.dimensions = 64;
        saved.save(&corpus_dir).unwrap();

        let build =
            CorpusConfig::load_for_build(&corpus_dir, "x", &temp.path().join("missing.yaml"))
                .unwrap();
        assert_eq!(build, saved);
    }
}
