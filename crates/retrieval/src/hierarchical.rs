//! Two-stage hierarchical retrieval
//!
//! Stage 1 (patent level): dense and sparse searches run concurrently
//! against the patent-level filter and are fused with RRF to pick a small
//! candidate patent set. Stage 2 (claim level): dense search restricted to
//! those patents. Collapsing the corpus to a few relevant patents before
//! searching claims bounds cost and avoids claim-level lexical noise, while
//! the dual-signal patent stage protects against either signal's blind
//! spots (dense misses exact terminology, lexical misses paraphrase).

use crate::dense::DenseRetriever;
use crate::fusion::{apply_allowlist, fuse_rrf, FusionPolicy};
use crate::sparse::SparseRetriever;
use claimsight_common::errors::Result;
use claimsight_common::types::{Level, ScoredMatch, SearchFilter};
use tracing::{debug, info, warn};

/// Configuration for hierarchical retrieval.
///
/// Defaults are tuned for a corpus of ~100 patent-level and a few thousand
/// claim-level instances.
#[derive(Debug, Clone, Copy)]
pub struct HierarchicalConfig {
    /// Patents kept after patent-stage fusion
    pub patent_top_k: usize,
    /// Claims returned by the claim stage
    pub claim_top_k: usize,
    /// RRF smoothing constant
    pub rrf_k: u32,
    /// Dense fan-out before fusion
    pub dense_top_k: usize,
    /// Sparse fan-out before fusion
    pub sparse_top_k: usize,
    /// How the two patent-level sources combine
    pub fusion_policy: FusionPolicy,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            patent_top_k: 10,
            claim_top_k: 30,
            rrf_k: 30,
            dense_top_k: 20,
            sparse_top_k: 20,
            fusion_policy: FusionPolicy::Independent,
        }
    }
}

/// 2-step hierarchical retriever.
///
/// Dense (vector index): both stages. Sparse (lexical index): patent stage
/// only, and only when query text is supplied. A sparse-index failure is
/// fatal for the request; skipping a signal silently is a caller policy
/// decision, not ours.
pub struct HierarchicalRetriever {
    dense: DenseRetriever,
    sparse: Option<SparseRetriever>,
    cfg: HierarchicalConfig,
}

impl HierarchicalRetriever {
    pub fn new(
        dense: DenseRetriever,
        sparse: Option<SparseRetriever>,
        cfg: HierarchicalConfig,
    ) -> Self {
        Self { dense, sparse, cfg }
    }

    /// Run the full patent -> claim retrieval.
    ///
    /// Returns claim-level matches, or an empty list when the patent stage
    /// finds no candidate patents (the "no matching patents" terminal state,
    /// not an error). The claim stage is never invoked in that case.
    pub async fn retrieve_claims(
        &self,
        dense_query_vec: &[f32],
        query_text: Option<&str>,
        base_filter: &SearchFilter,
    ) -> Result<Vec<ScoredMatch>> {
        debug!(
            patent_top_k = self.cfg.patent_top_k,
            claim_top_k = self.cfg.claim_top_k,
            rrf_k = self.cfg.rrf_k,
            "Starting 2-stage hierarchical retrieval"
        );

        // -----------------------
        // Stage 1: PATENT level
        // -----------------------
        let patent_filter = base_filter.clone().with_level(Level::Patent);

        let (dense_pat, sparse_pat) = match (&self.sparse, query_text) {
            (Some(sparse), Some(text)) => {
                // No data dependency between the two searches; run them
                // concurrently, first error wins.
                tokio::try_join!(
                    self.dense
                        .search(dense_query_vec, self.cfg.dense_top_k, &patent_filter),
                    sparse.search(text, self.cfg.sparse_top_k, &patent_filter),
                )?
            }
            _ => {
                debug!("Skipping sparse retrieval (no sparse retriever or query text)");
                let dense_pat = self
                    .dense
                    .search(dense_query_vec, self.cfg.dense_top_k, &patent_filter)
                    .await?;
                (dense_pat, Vec::new())
            }
        };
        info!(
            dense = dense_pat.len(),
            sparse = sparse_pat.len(),
            "Patent stage retrieval complete"
        );

        let dense_pat = match self.cfg.fusion_policy {
            FusionPolicy::Independent => dense_pat,
            FusionPolicy::SparseAllowlist => apply_allowlist(dense_pat, &sparse_pat),
        };

        let fused = fuse_rrf(&dense_pat, &sparse_pat, self.cfg.rrf_k, self.cfg.patent_top_k);

        // Distinct patent ids, preserving fused rank order
        let mut patent_ids: Vec<String> = Vec::new();
        for m in &fused {
            if let Some(pid) = m.patent_id() {
                if !patent_ids.iter().any(|p| p == pid) {
                    patent_ids.push(pid.to_string());
                }
            }
        }

        if patent_ids.is_empty() {
            warn!("Patent stage selected no patents, returning empty results");
            return Ok(Vec::new());
        }
        info!(patents = patent_ids.len(), "Patent stage selected candidate set");

        // -----------------------
        // Stage 2: CLAIM level
        // -----------------------
        // Dense only: the candidate set is already small and highly
        // relevant, where lexical search adds little.
        let claim_filter = base_filter
            .clone()
            .with_level(Level::Claim)
            .with_patent_ids(patent_ids);

        let claims = self
            .dense
            .search(dense_query_vec, self.cfg.claim_top_k, &claim_filter)
            .await?;
        info!(claims = claims.len(), "Claim stage retrieval complete");

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use claimsight_common::index::{DenseIndex, SparseIndex};
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn patent_match(id: &str, patent_id: &str) -> ScoredMatch {
        let mut metadata = Map::new();
        metadata.insert("patent_id".into(), json!(patent_id));
        ScoredMatch::new(id, 1.0, metadata)
    }

    /// Dense index that answers per-level and records claim-stage filters
    struct ScriptedDense {
        patent_results: Vec<ScoredMatch>,
        claim_results: Vec<ScoredMatch>,
        claim_calls: AtomicUsize,
        seen_claim_filter: Mutex<Option<SearchFilter>>,
    }

    impl ScriptedDense {
        fn new(patent_results: Vec<ScoredMatch>, claim_results: Vec<ScoredMatch>) -> Self {
            Self {
                patent_results,
                claim_results,
                claim_calls: AtomicUsize::new(0),
                seen_claim_filter: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl DenseIndex for ScriptedDense {
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            filter: &SearchFilter,
        ) -> Result<Vec<ScoredMatch>> {
            match filter.level {
                Some(Level::Claim) => {
                    self.claim_calls.fetch_add(1, Ordering::SeqCst);
                    *self.seen_claim_filter.lock().unwrap() = Some(filter.clone());
                    Ok(self.claim_results.clone())
                }
                _ => Ok(self.patent_results.clone()),
            }
        }
    }

    struct ScriptedSparse {
        results: Vec<ScoredMatch>,
    }

    #[async_trait]
    impl SparseIndex for ScriptedSparse {
        async fn search_bm25(
            &self,
            _query_text: &str,
            _top_k: usize,
            _filter: &SearchFilter,
            _fields: &[&str],
        ) -> Result<Vec<ScoredMatch>> {
            Ok(self.results.clone())
        }
    }

    fn retriever(
        dense: Arc<ScriptedDense>,
        sparse_results: Option<Vec<ScoredMatch>>,
        cfg: HierarchicalConfig,
    ) -> HierarchicalRetriever {
        HierarchicalRetriever::new(
            DenseRetriever::new(dense),
            sparse_results.map(|results| SparseRetriever::new(Arc::new(ScriptedSparse { results }))),
            cfg,
        )
    }

    #[tokio::test]
    async fn test_two_stage_flow() {
        let dense = Arc::new(ScriptedDense::new(
            vec![patent_match("P1", "P1"), patent_match("P2", "P2")],
            vec![patent_match("P1::claim::0001", "P1")],
        ));
        let r = retriever(
            dense.clone(),
            Some(vec![patent_match("P2", "P2")]),
            HierarchicalConfig::default(),
        );

        let claims = r
            .retrieve_claims(&[0.1, 0.2], Some("query"), &SearchFilter::new())
            .await
            .unwrap();

        assert_eq!(claims.len(), 1);
        assert_eq!(dense.claim_calls.load(Ordering::SeqCst), 1);

        // Claim stage filter restricts to the fused patent set, fused order
        let filter = dense.seen_claim_filter.lock().unwrap().clone().unwrap();
        assert_eq!(filter.level, Some(Level::Claim));
        let ids = filter.patent_id_in.unwrap();
        assert_eq!(ids[0], "P2"); // in both sources, outranks P1
        assert!(ids.contains(&"P1".to_string()));
    }

    #[tokio::test]
    async fn test_empty_patent_stage_short_circuits() {
        // Patent stage yields nothing: retrieval terminates without ever
        // touching the claim-stage adapter.
        let dense = Arc::new(ScriptedDense::new(vec![], vec![patent_match("x", "x")]));
        let r = retriever(dense.clone(), Some(vec![]), HierarchicalConfig::default());

        let claims = r
            .retrieve_claims(&[0.1], Some("query"), &SearchFilter::new())
            .await
            .unwrap();

        assert!(claims.is_empty());
        assert_eq!(dense.claim_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_matches_without_patent_id_metadata_yield_empty() {
        // Hits that never recorded a patent_id cannot seed the claim stage
        let dense = Arc::new(ScriptedDense::new(
            vec![ScoredMatch::new("anon", 0.9, Map::new())],
            vec![patent_match("x", "x")],
        ));
        let r = retriever(dense.clone(), None, HierarchicalConfig::default());

        let claims = r
            .retrieve_claims(&[0.1], None, &SearchFilter::new())
            .await
            .unwrap();
        assert!(claims.is_empty());
        assert_eq!(dense.claim_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sparse_skipped_without_query_text() {
        let dense = Arc::new(ScriptedDense::new(
            vec![patent_match("P1", "P1")],
            vec![patent_match("P1::claim::0001", "P1")],
        ));
        // Sparse retriever present but no query text supplied
        let r = retriever(
            dense,
            Some(vec![patent_match("P9", "P9")]),
            HierarchicalConfig::default(),
        );

        let claims = r
            .retrieve_claims(&[0.1], None, &SearchFilter::new())
            .await
            .unwrap();
        assert_eq!(claims.len(), 1);
    }

    #[tokio::test]
    async fn test_sparse_allowlist_mode() {
        let dense = Arc::new(ScriptedDense::new(
            vec![patent_match("P1", "P1"), patent_match("P2", "P2")],
            vec![patent_match("P2::claim::0001", "P2")],
        ));
        let cfg = HierarchicalConfig {
            fusion_policy: FusionPolicy::SparseAllowlist,
            ..Default::default()
        };
        let r = retriever(dense.clone(), Some(vec![patent_match("P2", "P2")]), cfg);

        r.retrieve_claims(&[0.1], Some("query"), &SearchFilter::new())
            .await
            .unwrap();

        // P1 is dense-only and gets dropped by the allowlist
        let filter = dense.seen_claim_filter.lock().unwrap().clone().unwrap();
        assert_eq!(filter.patent_id_in.unwrap(), vec!["P2".to_string()]);
    }

    #[tokio::test]
    async fn test_base_filter_is_preserved() {
        let dense = Arc::new(ScriptedDense::new(
            vec![patent_match("P1", "P1")],
            vec![patent_match("P1::claim::0001", "P1")],
        ));
        let r = retriever(dense.clone(), None, HierarchicalConfig::default());

        let base = SearchFilter::new().with_year_range(Some(2018), None);
        r.retrieve_claims(&[0.1], None, &base).await.unwrap();

        let filter = dense.seen_claim_filter.lock().unwrap().clone().unwrap();
        assert_eq!(filter.year_from, Some(2018));
    }
}
