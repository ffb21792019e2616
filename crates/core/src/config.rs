//! Configuration management for docqa.
//!
//! Configuration is layered, later layers winning:
//! - Built-in defaults
//! - Config file (`.docqa/config.yaml` or `DOCQA_CONFIG`)
//! - Environment variables (`DOCQA_*`)
//! - Command-line flags (see [`AppConfig::with_overrides`])
//!
//! The configuration is workspace-centric; indexes live under `.docqa/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default number of chunks returned by a retrieval.
pub const DEFAULT_TOP_K: usize = 5;

/// Default corpus name when none is given.
pub const DEFAULT_CORPUS: &str = "default";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Answer-generation provider (e.g., "ollama")
    pub provider: String,

    /// Answer-generation model identifier
    pub model: String,

    /// Corpus (index directory name) to operate on
    pub corpus: String,

    /// Number of chunks to retrieve when a command does not say
    pub top_k: usize,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Per-provider settings from config.yaml
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Base URL of the provider API
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model to use with this provider
    #[serde(default)]
    pub model: Option<String>,

    /// Request timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    workspace: Option<WorkspaceSection>,
    retrieval: Option<RetrievalSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    #[serde(rename = "activeProvider")]
    active_provider: String,

    #[serde(default)]
    providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RetrievalSection {
    corpus: Option<String>,
    #[serde(rename = "topK")]
    top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            corpus: DEFAULT_CORPUS.to_string(),
            top_k: DEFAULT_TOP_K,
            log_level: None,
            verbose: false,
            no_color: false,
            providers: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment.
    ///
    /// `workspace` and `config_file` locate the YAML file and take precedence
    /// over their environment variables.
    ///
    /// Environment variables:
    /// - `DOCQA_WORKSPACE`: Override workspace path
    /// - `DOCQA_CONFIG`: Path to config file
    /// - `DOCQA_PROVIDER`: Answer-generation provider
    /// - `DOCQA_MODEL`: Answer-generation model
    /// - `DOCQA_CORPUS`: Corpus name
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var_os("DOCQA_WORKSPACE").map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var_os("DOCQA_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.docqa_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCQA_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCQA_MODEL") {
            config.model = model;
        }

        if let Ok(corpus) = std::env::var("DOCQA_CORPUS") {
            config.corpus = corpus;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            if let Some(corpus) = retrieval.corpus {
                result.corpus = corpus;
            }
            if let Some(top_k) = retrieval.top_k {
                if top_k == 0 {
                    return Err(AppError::Config(format!(
                        "retrieval.topK must be at least 1 in {:?}",
                        path
                    )));
                }
                result.top_k = top_k;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            if let Some(model) = llm
                .providers
                .get(&llm.active_provider)
                .and_then(|p| p.model.clone())
            {
                result.model = model;
            }
            result.providers = llm.providers;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment and file settings.
    /// The workspace and config file are given to [`AppConfig::load`] instead,
    /// since they decide which file is merged.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        corpus: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(corpus) = corpus {
            self.corpus = corpus;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docqa directory.
    pub fn docqa_dir(&self) -> PathBuf {
        self.workspace.join(".docqa")
    }

    /// Directory holding the index of the configured corpus.
    pub fn corpus_dir(&self) -> PathBuf {
        self.docqa_dir().join("corpora").join(&self.corpus)
    }

    /// Ensure the .docqa directory exists.
    pub fn ensure_docqa_dir(&self) -> AppResult<()> {
        let dir = self.docqa_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docqa directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Settings of the active answer-generation provider, if configured.
    pub fn active_provider_config(&self) -> Option<&ProviderConfig> {
        self.providers.get(&self.provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.corpus, "default");
        assert_eq!(config.top_k, 5);
        assert!(!config.verbose);
    }

    #[test]
    fn test_corpus_dir() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/ws");
        config.corpus = "lectures".to_string();
        assert_eq!(
            config.corpus_dir(),
            PathBuf::from("/ws/.docqa/corpora/lectures")
        );
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            Some("ollama".to_string()),
            Some("qwen2.5".to_string()),
            Some("notes".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.model, "qwen2.5");
        assert_eq!(overridden.corpus, "notes");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: http://gpu-box:11434
      model: mistral
retrieval:
  corpus: handbook
  topK: 8
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.model, "mistral");
        assert_eq!(merged.corpus, "handbook");
        assert_eq!(merged.top_k, 8);
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.no_color);
        assert_eq!(
            merged.active_provider_config().unwrap().endpoint.as_deref(),
            Some("http://gpu-box:11434")
        );
    }

    #[test]
    fn test_merge_yaml_rejects_zero_top_k() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "retrieval:\n  topK: 0\n").unwrap();

        let err = AppConfig::default().merge_yaml(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    const TOP_K_YAML: &str = "retrieval:\n  corpus: handbook\n  topK: 8\nlogging:\n  level: warn\n";

    #[test]
    fn test_load_reads_explicit_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("my.yaml");
        std::fs::write(&path, TOP_K_YAML).unwrap();

        let config = AppConfig::load(Some(temp.path().to_path_buf()), Some(path.clone())).unwrap();
        assert_eq!(config.config_file, Some(path));
        assert_eq!(config.top_k, 8);
        assert_eq!(config.corpus, "handbook");
    }

    #[test]
    fn test_load_reads_config_under_workspace() {
        let temp = TempDir::new().unwrap();
        let docqa_dir = temp.path().join(".docqa");
        std::fs::create_dir_all(&docqa_dir).unwrap();
        std::fs::write(docqa_dir.join("config.yaml"), TOP_K_YAML).unwrap();

        let config = AppConfig::load(Some(temp.path().to_path_buf()), None)
            .unwrap()
            .with_overrides(None, None, None, None, false, false);
        assert_eq!(config.workspace, temp.path());
        assert_eq!(config.top_k, 8);
    }

    #[test]
    fn test_load_rejects_missing_workspace() {
        let err = AppConfig::load(Some(PathBuf::from("/definitely/not/a/workspace")), None)
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
