//! Public result types for the retrieval pipeline

use claimsight_common::types::Level;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which retrieval stage produced an evidence item's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Dense,
    Sparse,
    Hybrid,
    Reranked,
}

impl EvidenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceSource::Dense => "dense",
            EvidenceSource::Sparse => "sparse",
            EvidenceSource::Hybrid => "hybrid",
            EvidenceSource::Reranked => "reranked",
        }
    }
}

/// A single retrieved, hydrated text unit with provenance.
///
/// This is the externally visible unit of evidence. `text` is the canonical
/// chunk text whenever the document store has it; `score` is the score at
/// the stage that produced the item and is not comparable across stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub chunk_id: String,
    pub patent_id: String,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_no: Option<i32>,
    pub text: String,
    pub score: f64,
    pub source: EvidenceSource,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Query mode, inferred from the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    #[default]
    PriorArt,
    Infringement,
    Landscape,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::PriorArt => "prior_art",
            QueryMode::Infringement => "infringement",
            QueryMode::Landscape => "landscape",
        }
    }
}

/// Response returned by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub mode: QueryMode,
    pub answer: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
}

/// Final evidence selection policy.
///
/// `final_top_n` is the number of evidence items shown to the user after
/// all retrieval, fusion, and ranking stages are complete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RagPolicy {
    pub final_top_n: usize,
}

impl Default for RagPolicy {
    fn default() -> Self {
        Self { final_top_n: 8 }
    }
}
