//! Sparse retrieval adapter
//!
//! Lexical BM25 retrieval, patent level only. Claims are too short and too
//! numerous for useful BM25 discrimination at this corpus size, so there is
//! deliberately no claim-level lexical path.

use claimsight_common::errors::{AppError, Result};
use claimsight_common::index::SparseIndex;
use claimsight_common::types::{ScoredMatch, SearchFilter};
use std::sync::Arc;

/// Fields scored by the lexical search, title weighted highest.
const SEARCH_FIELDS: &[&str] = &["title^2", "abstract", "text", "claims", "patent_id"];

#[derive(Clone)]
pub struct SparseRetriever {
    index: Arc<dyn SparseIndex>,
}

impl SparseRetriever {
    pub fn new(index: Arc<dyn SparseIndex>) -> Self {
        Self { index }
    }

    /// BM25 retrieval at patent level. The caller's filter should already
    /// carry `level = patent`.
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredMatch>> {
        if query_text.trim().is_empty() {
            return Err(AppError::validation(
                "query_text is required",
                Some("query_text"),
            ));
        }
        if top_k == 0 {
            return Err(AppError::validation("top_k must be > 0", Some("top_k")));
        }

        self.index
            .search_bm25(query_text, top_k, filter, SEARCH_FIELDS)
            .await
    }
}
