//! RAG orchestrator
//!
//! Sequences the full query pipeline: encode -> retrieve -> assemble
//! evidence -> rerank -> truncate -> generate answer. Every collaborator is
//! injected at construction; the orchestrator owns no ambient state and a
//! single instance serves concurrent requests without locking.

use crate::dense::DenseRetriever;
use crate::evidence::EvidenceAssembler;
use crate::hierarchical::{HierarchicalConfig, HierarchicalRetriever};
use crate::prompts;
use crate::rerank::Reranker;
use crate::sparse::SparseRetriever;
use crate::types::{EvidenceItem, EvidenceSource, QueryMode, QueryResponse, RagPolicy};
use claimsight_common::db::ChunkTextStore;
use claimsight_common::embeddings::Embedder;
use claimsight_common::errors::{AppError, Result};
use claimsight_common::index::{DenseIndex, SparseIndex};
use claimsight_common::llm::Generator;
use claimsight_common::types::{ScoredMatch, SearchFilter};
use std::sync::Arc;
use tracing::{debug, info};

/// Fan-out for the non-hierarchical (flat dense) retrieval path
const FLAT_TOP_K: usize = 50;

const NO_EVIDENCE_ANSWER: &str = "No relevant patents found for your query.";

/// Per-query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub mode: QueryMode,
    pub filter: SearchFilter,
    pub flat_retrieval: bool,
    pub skip_reranking: bool,
}

pub struct RagOrchestrator {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    dense: DenseRetriever,
    retriever: HierarchicalRetriever,
    assembler: EvidenceAssembler,
    reranker: Arc<dyn Reranker>,
    policy: RagPolicy,
}

impl RagOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        dense_index: Arc<dyn DenseIndex>,
        sparse_index: Option<Arc<dyn SparseIndex>>,
        chunk_store: Arc<dyn ChunkTextStore>,
        reranker: Arc<dyn Reranker>,
        hierarchical_cfg: HierarchicalConfig,
        policy: RagPolicy,
    ) -> Self {
        let dense = DenseRetriever::new(dense_index);
        let sparse = sparse_index.map(SparseRetriever::new);
        let retriever = HierarchicalRetriever::new(dense.clone(), sparse, hierarchical_cfg);

        Self {
            embedder,
            generator,
            dense,
            retriever,
            assembler: EvidenceAssembler::new(chunk_store),
            reranker,
            policy,
        }
    }

    /// Execute the full RAG pipeline for a patent query.
    pub async fn query(&self, query: &str, opts: QueryOptions) -> Result<QueryResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("query must be non-empty", Some("query")));
        }

        info!(mode = opts.mode.as_str(), "Starting RAG query");

        // Step 1: encode the query
        let dense_query_vec = self.embedder.embed(query).await?;

        // Step 2: retrieve candidates
        let (matches, source) = self.retrieve(&dense_query_vec, query, &opts).await?;
        debug!(candidates = matches.len(), source = source.as_str(), "Retrieval complete");

        // Step 3: hydrate into evidence items
        let mut evidence = self.assembler.assemble(&matches, source).await?;

        // Step 4: rerank
        if !opts.skip_reranking && !evidence.is_empty() {
            evidence = self.reranker.rerank(query, evidence).await?;
        }

        // Step 5: final selection policy
        evidence.truncate(self.policy.final_top_n);

        // Step 6: generate the answer
        let answer = self.generate_answer(query, &evidence, opts.mode).await?;

        info!(evidence = evidence.len(), "RAG query complete");

        Ok(QueryResponse {
            mode: opts.mode,
            answer,
            evidence,
        })
    }

    /// Retrieve evidence without generating an answer. Useful for debugging
    /// or custom downstream processing.
    pub async fn retrieve_only(
        &self,
        query: &str,
        filter: SearchFilter,
        top_k: usize,
        flat_retrieval: bool,
    ) -> Result<Vec<EvidenceItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("query must be non-empty", Some("query")));
        }

        let dense_query_vec = self.embedder.embed(query).await?;
        let opts = QueryOptions {
            filter,
            flat_retrieval,
            ..Default::default()
        };
        let (matches, source) = self.retrieve(&dense_query_vec, query, &opts).await?;

        let mut evidence = self.assembler.assemble(&matches, source).await?;
        evidence.truncate(top_k);
        Ok(evidence)
    }

    async fn retrieve(
        &self,
        dense_query_vec: &[f32],
        query_text: &str,
        opts: &QueryOptions,
    ) -> Result<(Vec<ScoredMatch>, EvidenceSource)> {
        if opts.flat_retrieval {
            let matches = self
                .dense
                .search(dense_query_vec, FLAT_TOP_K, &opts.filter)
                .await?;
            Ok((matches, EvidenceSource::Dense))
        } else {
            let matches = self
                .retriever
                .retrieve_claims(dense_query_vec, Some(query_text), &opts.filter)
                .await?;
            Ok((matches, EvidenceSource::Hybrid))
        }
    }

    async fn generate_answer(
        &self,
        query: &str,
        evidence: &[EvidenceItem],
        mode: QueryMode,
    ) -> Result<String> {
        if evidence.is_empty() {
            return Ok(NO_EVIDENCE_ANSWER.to_string());
        }

        let prompt = prompts::build_answer_prompt(query, evidence);
        self.generator
            .generate_text(Some(prompts::answer_instructions(mode)), &prompt)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rerank::{LlmReranker, RerankConfig};
    use async_trait::async_trait;
    use claimsight_common::db::ChunkDocument;
    use claimsight_common::types::Level;
    use serde_json::{json, Map};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(AppError::validation("Cannot embed empty text", Some("text")));
            }
            Ok(vec![0.1, 0.2, 0.3])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn model_name(&self) -> &str {
            "stub"
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    /// Routes responses by instructions so the same mock serves both the
    /// rerank call and the answer call.
    struct RoutingGenerator {
        answer_calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for RoutingGenerator {
        async fn generate_text(&self, instructions: Option<&str>, _prompt: &str) -> Result<String> {
            if instructions.unwrap_or_default().contains("reranking model") {
                Ok("{\"ranked_ids\": [\"US2::claim::0001\", \"US1::claim::0001\"]}".to_string())
            } else {
                self.answer_calls.fetch_add(1, Ordering::SeqCst);
                Ok("The most relevant prior art is [1].".to_string())
            }
        }

        fn model_name(&self) -> &str {
            "routing-mock"
        }
    }

    struct StubDense;

    fn m(id: &str, patent_id: &str, level: &str, score: f64) -> ScoredMatch {
        let mut metadata = Map::new();
        metadata.insert("patent_id".into(), json!(patent_id));
        metadata.insert("level".into(), json!(level));
        ScoredMatch::new(id, score, metadata)
    }

    #[async_trait]
    impl DenseIndex for StubDense {
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            filter: &SearchFilter,
        ) -> Result<Vec<ScoredMatch>> {
            match filter.level {
                Some(Level::Claim) => Ok(vec![
                    m("US1::claim::0001", "US1", "claim", 0.9),
                    m("US2::claim::0001", "US2", "claim", 0.8),
                ]),
                _ => Ok(vec![m("US1", "US1", "patent", 0.9), m("US2", "US2", "patent", 0.8)]),
            }
        }
    }

    struct EmptyDense;

    #[async_trait]
    impl DenseIndex for EmptyDense {
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _filter: &SearchFilter,
        ) -> Result<Vec<ScoredMatch>> {
            Ok(vec![])
        }
    }

    struct StubSparse;

    #[async_trait]
    impl SparseIndex for StubSparse {
        async fn search_bm25(
            &self,
            _query_text: &str,
            _top_k: usize,
            _filter: &SearchFilter,
            _fields: &[&str],
        ) -> Result<Vec<ScoredMatch>> {
            Ok(vec![m("US2", "US2", "patent", 11.0)])
        }
    }

    struct StubStore;

    #[async_trait]
    impl ChunkTextStore for StubStore {
        async fn get_chunks_by_ids(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, ChunkDocument>> {
            Ok(ids
                .iter()
                .map(|id| {
                    (
                        id.clone(),
                        ChunkDocument {
                            chunk_id: id.clone(),
                            patent_id: id.split(':').next().unwrap_or_default().to_string(),
                            level: Some(Level::Claim),
                            title: Some("Stored".to_string()),
                            claim_no: Some(1),
                            text: format!("canonical text for {id}"),
                        },
                    )
                })
                .collect())
        }
    }

    fn orchestrator(
        dense: Arc<dyn DenseIndex>,
        generator: Arc<RoutingGenerator>,
    ) -> RagOrchestrator {
        let reranker = Arc::new(LlmReranker::new(generator.clone(), RerankConfig::default()));
        RagOrchestrator::new(
            Arc::new(StubEmbedder),
            generator,
            dense,
            Some(Arc::new(StubSparse)),
            Arc::new(StubStore),
            reranker,
            HierarchicalConfig::default(),
            RagPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_full_pipeline_with_reranking() {
        let generator = Arc::new(RoutingGenerator {
            answer_calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(Arc::new(StubDense), generator.clone());

        let response = orch
            .query("anode coating prior art", QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(response.mode, QueryMode::PriorArt);
        assert_eq!(response.answer, "The most relevant prior art is [1].");
        assert_eq!(response.evidence.len(), 2);
        // Model ranking put US2 first
        assert_eq!(response.evidence[0].chunk_id, "US2::claim::0001");
        assert_eq!(response.evidence[0].source, EvidenceSource::Reranked);
        // Text was hydrated from the store, not the index payload
        assert!(response.evidence[0].text.starts_with("canonical text"));
        assert_eq!(generator.answer_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_matches_short_circuits_generation() {
        let generator = Arc::new(RoutingGenerator {
            answer_calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(Arc::new(EmptyDense), generator.clone());

        let response = orch.query("nothing matches this", QueryOptions::default()).await.unwrap();

        assert_eq!(response.answer, NO_EVIDENCE_ANSWER);
        assert!(response.evidence.is_empty());
        assert_eq!(generator.answer_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let generator = Arc::new(RoutingGenerator {
            answer_calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(Arc::new(StubDense), generator);

        let err = orch.query("   ", QueryOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_flat_retrieval_labels_source_dense() {
        let generator = Arc::new(RoutingGenerator {
            answer_calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(Arc::new(StubDense), generator);

        let evidence = orch
            .retrieve_only("q", SearchFilter::new(), 10, true)
            .await
            .unwrap();
        assert!(!evidence.is_empty());
        assert!(evidence.iter().all(|e| e.source == EvidenceSource::Dense));
    }

    #[tokio::test]
    async fn test_retrieve_only_respects_top_k() {
        let generator = Arc::new(RoutingGenerator {
            answer_calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(Arc::new(StubDense), generator);

        let evidence = orch
            .retrieve_only("q", SearchFilter::new(), 1, false)
            .await
            .unwrap();
        assert_eq!(evidence.len(), 1);
    }
}
