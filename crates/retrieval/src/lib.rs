//! ClaimSight retrieval core
//!
//! The hybrid hierarchical retrieval and fusion pipeline:
//! - Rank fusion (RRF) combining dense and sparse patent-level signals
//! - Two-stage patent -> claim hierarchical retrieval
//! - LLM-based reranking with strict fail-open parsing
//! - Evidence assembly against the canonical chunk store
//! - The RAG orchestrator sequencing the full query pipeline
//!
//! Everything here is per-request: the pipeline holds no cross-request
//! state, and concurrent queries are fully independent.

pub mod dense;
pub mod evidence;
pub mod fusion;
pub mod hierarchical;
pub mod orchestrator;
pub mod prompts;
pub mod rerank;
pub mod sparse;
pub mod types;

pub use dense::DenseRetriever;
pub use evidence::EvidenceAssembler;
pub use fusion::{fuse_rrf, FusionPolicy};
pub use hierarchical::{HierarchicalConfig, HierarchicalRetriever};
pub use orchestrator::{QueryOptions, RagOrchestrator};
pub use rerank::{LlmReranker, NoopReranker, RerankConfig, Reranker};
pub use sparse::SparseRetriever;
pub use types::{EvidenceItem, EvidenceSource, QueryMode, QueryResponse, RagPolicy};
