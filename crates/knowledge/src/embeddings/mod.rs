//! Embedding providers.
//!
//! The retrieval core only sees the [`EmbeddingProvider`] trait; concrete
//! providers are picked from a corpus's [`EmbeddingConfig`].

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
