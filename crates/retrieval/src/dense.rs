//! Dense retrieval adapter
//!
//! Semantic retrieval over the vector index. Supports both patent-level and
//! claim-level search for the two-stage hierarchical pipeline; the index
//! client routes to the right index from the filter's level.

use claimsight_common::errors::{AppError, Result};
use claimsight_common::index::DenseIndex;
use claimsight_common::types::{ScoredMatch, SearchFilter};
use std::sync::Arc;

#[derive(Clone)]
pub struct DenseRetriever {
    index: Arc<dyn DenseIndex>,
}

impl DenseRetriever {
    pub fn new(index: Arc<dyn DenseIndex>) -> Self {
        Self { index }
    }

    /// Pure dense retrieval at the hierarchy level implied by the filter.
    pub async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredMatch>> {
        if query_vector.is_empty() {
            return Err(AppError::validation(
                "dense query vector required",
                Some("query_vector"),
            ));
        }
        if top_k == 0 {
            return Err(AppError::validation("top_k must be > 0", Some("top_k")));
        }

        self.index.query(query_vector, top_k, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoIndex;

    #[async_trait]
    impl DenseIndex for EchoIndex {
        async fn query(
            &self,
            _vector: &[f32],
            top_k: usize,
            _filter: &SearchFilter,
        ) -> Result<Vec<ScoredMatch>> {
            Ok((0..top_k.min(3))
                .map(|i| ScoredMatch::new(format!("m{i}"), 1.0 - i as f64 * 0.1, Default::default()))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_vector() {
        let retriever = DenseRetriever::new(Arc::new(EchoIndex));
        let err = retriever.search(&[], 5, &SearchFilter::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_rejects_zero_top_k() {
        let retriever = DenseRetriever::new(Arc::new(EchoIndex));
        let err = retriever
            .search(&[0.1, 0.2], 0, &SearchFilter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_delegates_to_index() {
        let retriever = DenseRetriever::new(Arc::new(EchoIndex));
        let results = retriever
            .search(&[0.1, 0.2], 3, &SearchFilter::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "m0");
    }
}
