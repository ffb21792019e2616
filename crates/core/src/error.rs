//! Error types for docqa.
//!
//! A single error enum covers every failure category in the workspace:
//! configuration, I/O, the retrieval core's consistency checks, the
//! embedding and answer-generation collaborators, and prompt rendering.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for docqa.
///
/// All fallible functions return `Result<T, AppError>`. The retrieval
/// core's variants (`NotFound` through `EmbeddingService`) each describe a
/// broken invariant and are never downgraded to warnings.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted index or chunk file is missing
    #[error("{what} not found at {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// A persisted file exists but cannot be trusted
    #[error("Corrupt data in {}: {reason}", path.display())]
    CorruptData { path: PathBuf, reason: String },

    /// Vector length disagreement at build, load or query time
    #[error("Dimension mismatch ({context}): expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    /// Index build attempted with nothing to index
    #[error("Empty index: {0}")]
    EmptyIndex(String),

    /// Chunk store and vector index disagree
    #[error("Inconsistent index: {0}")]
    InconsistentIndex(String),

    /// The embedding collaborator failed or broke its contract
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// A chunk that can never enter the store
    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    /// A malformed search request
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Shorthand for a `CorruptData` error on `path`.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AppError::CorruptData {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_file() {
        let err = AppError::NotFound {
            what: "vector index",
            path: PathBuf::from("/tmp/idx/vectors.bin"),
        };
        let msg = err.to_string();
        assert!(msg.contains("vector index"));
        assert!(msg.contains("vectors.bin"));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            actual: 768,
            context: "query vector".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch (query vector): expected 384, got 768"
        );
    }

    #[test]
    fn test_corrupt_helper() {
        let err = AppError::corrupt("chunks.json", "id 3 at position 2");
        assert!(matches!(err, AppError::CorruptData { .. }));
        assert!(err.to_string().contains("id 3 at position 2"));
    }
}
