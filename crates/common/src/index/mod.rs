//! Search index clients
//!
//! Narrow contracts over the two retrieval backends:
//! - `DenseIndex`: vector similarity search (semantic match)
//! - `SparseIndex`: BM25 lexical search over raw text
//!
//! Both clients translate the shared typed `SearchFilter` into their own
//! backend's query language.

mod lexical;
mod vector;

pub use lexical::LexicalIndexClient;
pub use vector::VectorIndexClient;

use crate::errors::Result;
use crate::types::{ScoredMatch, SearchFilter};
use async_trait::async_trait;

/// Dense vector index over patent- and claim-level chunks
#[async_trait]
pub trait DenseIndex: Send + Sync {
    /// Query the index at the hierarchy level implied by `filter.level`.
    /// Fails with a validation error if `top_k == 0` or the vector is empty.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredMatch>>;
}

/// Lexical BM25 index over patent-level documents
#[async_trait]
pub trait SparseIndex: Send + Sync {
    /// BM25 search over the given weighted fields.
    /// Fails with a validation error on an empty query or `top_k == 0`.
    async fn search_bm25(
        &self,
        query_text: &str,
        top_k: usize,
        filter: &SearchFilter,
        fields: &[&str],
    ) -> Result<Vec<ScoredMatch>>;
}
