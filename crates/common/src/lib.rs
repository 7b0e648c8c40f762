//! ClaimSight Common Library
//!
//! Shared code for the ClaimSight patent discovery services including:
//! - Core retrieval types (scored matches, hierarchy levels, search filters)
//! - Vector and lexical index clients
//! - Canonical chunk text store (Postgres)
//! - Embedding and LLM generation clients
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{ChunkDocument, ChunkTextStore, Repository};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use index::{DenseIndex, SparseIndex};
pub use llm::Generator;
pub use types::{Level, ScoredMatch, SearchFilter};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
