//! Document question-answering retrieval core.
//!
//! Builds a chunk store and a vector index from extracted document chunks,
//! publishes them as one generation under a corpus directory, and answers
//! nearest-neighbour queries against the published pair.

pub mod builder;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod extract;
pub mod layout;
pub mod lock;
pub mod retriever;
pub mod store;
pub mod types;
pub mod vector_index;


// Re-export commonly used types
pub use builder::{BuildReport, IndexBuilder};
pub use config::CorpusConfig;
pub use context::{assemble, render};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use extract::load_candidates;
pub use layout::{IndexLayout, IndexManifest, IndexStats};
pub use retriever::{RetrievalResult, RetrievedChunk, Retriever};
pub use store::ChunkStore;
pub use types::{Chunk, ChunkCandidate, SkippedCandidate};
pub use vector_index::{Neighbor, VectorIndex};
