//! LLM-based reranking
//!
//! Asks a generative model to reorder a bounded candidate set by relevance.
//! Reranking is a refinement, never a point of failure: malformed model
//! output fails open to the original order, and a candidate is never
//! dropped because the model forgot to mention it. Transport failures from
//! the generator, in contrast, propagate: they mean the upstream exhausted
//! its own retry budget.

use crate::types::{EvidenceItem, EvidenceSource};
use async_trait::async_trait;
use claimsight_common::errors::Result;
use claimsight_common::llm::Generator;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reranking bounds.
///
/// `max_candidates` limits how many retrieved items the model is asked to
/// consider; `top_n` how many survive; `snippet_chars` truncates evidence
/// text in the prompt.
#[derive(Debug, Clone, Copy)]
pub struct RerankConfig {
    pub max_candidates: usize,
    pub top_n: usize,
    pub snippet_chars: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            max_candidates: 50,
            top_n: 15,
            snippet_chars: 900,
        }
    }
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `items` by relevance to `query`; returns at most `top_n`.
    async fn rerank(&self, query: &str, items: Vec<EvidenceItem>) -> Result<Vec<EvidenceItem>>;
}

/// Keeps the original order.
pub struct NoopReranker {
    cfg: RerankConfig,
}

impl NoopReranker {
    pub fn new(cfg: RerankConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(&self, _query: &str, items: Vec<EvidenceItem>) -> Result<Vec<EvidenceItem>> {
        let mut limited = items;
        limited.truncate(self.cfg.max_candidates);
        limited.truncate(self.cfg.top_n);
        Ok(limited)
    }
}

/// Outcome of parsing the model's ranking response
#[derive(Debug, PartialEq)]
enum ParsedRanking {
    Parsed(Vec<String>),
    Unparsable,
}

const RERANK_INSTRUCTIONS: &str = "\
You are a reranking model. Reorder candidates by relevance to the user query.
Return ONLY valid JSON with this exact shape:
{\"ranked_ids\": [\"<id1>\", \"<id2>\", \"...\"]}
Rules:
- Use candidate 'id' values exactly as given.
- Include each id at most once.
- If uncertain, keep original relative order.
";

/// LLM-based reranker.
///
/// Not as strong or cheap as a cross-encoder, but it needs no extra model
/// deployment, and reranking claim-level chunks is where the ROI is for
/// patents.
pub struct LlmReranker {
    llm: Arc<dyn Generator>,
    cfg: RerankConfig,
}

impl LlmReranker {
    pub fn new(llm: Arc<dyn Generator>, cfg: RerankConfig) -> Self {
        Self { llm, cfg }
    }

    fn build_prompt(&self, query: &str, candidates: &[EvidenceItem]) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push("User query:".to_string());
        lines.push(query.trim().to_string());
        lines.push(String::new());
        lines.push("Candidates (rerank by relevance):".to_string());

        for (idx, c) in candidates.iter().enumerate() {
            let cid = candidate_id(c);
            let claim = c
                .claim_no
                .map(|n| format!("claim_no={n}"))
                .unwrap_or_default();
            let snippet = make_snippet(&c.text, self.cfg.snippet_chars);

            lines.push(format!("\n[{}] id={}", idx + 1, cid));
            lines.push(
                format!("patent_id={} level={} {}", c.patent_id, c.level, claim)
                    .trim_end()
                    .to_string(),
            );
            if let Some(title) = &c.title {
                lines.push(format!("title={title}"));
            }
            lines.push("text:".to_string());
            lines.push(snippet);
        }

        lines.push("\nReturn JSON only.".to_string());
        lines.join("\n")
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(&self, query: &str, items: Vec<EvidenceItem>) -> Result<Vec<EvidenceItem>> {
        let mut candidates = items;
        candidates.truncate(self.cfg.max_candidates);
        if candidates.len() <= 1 {
            return Ok(candidates);
        }

        let prompt = self.build_prompt(query, &candidates);
        let raw = self
            .llm
            .generate_text(Some(RERANK_INSTRUCTIONS), &prompt)
            .await?;

        let mut out = match parse_ranked_ids(&raw) {
            ParsedRanking::Parsed(ids) => {
                debug!(ranked = ids.len(), candidates = candidates.len(), "Applying model ranking");
                apply_ranking(candidates, &ids)
            }
            ParsedRanking::Unparsable => {
                warn!("Reranker output unusable, keeping original order");
                candidates
            }
        };

        out.truncate(self.cfg.top_n);
        Ok(out)
    }
}

/// Synthetic candidate id: the chunk id, or a composite when absent.
fn candidate_id(item: &EvidenceItem) -> String {
    if !item.chunk_id.is_empty() {
        return item.chunk_id.clone();
    }
    let claim = item
        .claim_no
        .map(|n| n.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!("{}:{}:{}", item.patent_id, item.level, claim)
}

/// Locate and strictly parse the first top-level JSON object in the raw
/// response, tolerating surrounding prose. Any deviation from the expected
/// shape is a parse failure, not an error.
fn parse_ranked_ids(raw: &str) -> ParsedRanking {
    #[derive(Deserialize)]
    struct Payload {
        ranked_ids: Vec<String>,
    }

    let s = raw.trim();
    let obj = match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => return ParsedRanking::Unparsable,
    };

    let payload: Payload = match serde_json::from_str(obj) {
        Ok(p) => p,
        Err(_) => return ParsedRanking::Unparsable,
    };

    let ids: Vec<String> = payload
        .ranked_ids
        .iter()
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        ParsedRanking::Unparsable
    } else {
        ParsedRanking::Parsed(ids)
    }
}

/// Reorder candidates by the model's id list, failing open:
/// - ids not matching any candidate are skipped
/// - each candidate is honored at most once
/// - candidates the model never mentioned are appended in their original
///   relative order, never dropped
///
/// Items that took a model-assigned position are relabelled `reranked`;
/// appended stragglers keep their retrieval-stage source.
fn apply_ranking(candidates: Vec<EvidenceItem>, ranked_ids: &[String]) -> Vec<EvidenceItem> {
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for (i, c) in candidates.iter().enumerate() {
        // First occurrence wins if ids ever collide
        by_id.entry(candidate_id(c)).or_insert(i);
    }

    let mut slots: Vec<Option<EvidenceItem>> = candidates.into_iter().map(Some).collect();
    let mut out: Vec<EvidenceItem> = Vec::with_capacity(slots.len());

    for rid in ranked_ids {
        if let Some(&i) = by_id.get(rid) {
            if let Some(mut item) = slots[i].take() {
                item.source = EvidenceSource::Reranked;
                out.push(item);
            }
        }
    }

    for slot in slots.iter_mut() {
        if let Some(item) = slot.take() {
            out.push(item);
        }
    }

    out
}

/// Truncate evidence text for the rerank prompt; counts characters, not
/// bytes, so multibyte text never splits mid-character.
fn make_snippet(text: &str, limit: usize) -> String {
    let t = text.trim();
    if t.chars().count() <= limit {
        return t.to_string();
    }
    let cut: String = t.chars().take(limit.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimsight_common::errors::AppError;
    use claimsight_common::types::Level;
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        response: String,
        calls: AtomicUsize,
    }

    impl CountingGenerator {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn generate_text(&self, _instructions: Option<&str>, prompt: &str) -> Result<String> {
            if prompt.trim().is_empty() {
                return Err(AppError::validation("Prompt must be non-empty", Some("prompt")));
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }

        fn model_name(&self) -> &str {
            "counting-mock"
        }
    }

    fn item(chunk_id: &str) -> EvidenceItem {
        EvidenceItem {
            chunk_id: chunk_id.to_string(),
            patent_id: "US1".to_string(),
            level: Level::Claim,
            title: None,
            claim_no: Some(1),
            text: "A method comprising...".to_string(),
            score: 0.5,
            source: EvidenceSource::Hybrid,
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_zero_and_one_candidates_skip_the_model() {
        let llm = CountingGenerator::new("{\"ranked_ids\": []}");
        let reranker = LlmReranker::new(llm.clone(), RerankConfig::default());

        let out = reranker.rerank("q", vec![]).await.unwrap();
        assert!(out.is_empty());

        let out = reranker.rerank("q", vec![item("only")]).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, EvidenceSource::Hybrid);

        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reorders_per_model_ranking() {
        let llm = CountingGenerator::new("{\"ranked_ids\": [\"c\", \"a\", \"b\"]}");
        let reranker = LlmReranker::new(llm.clone(), RerankConfig::default());

        let out = reranker
            .rerank("q", vec![item("a"), item("b"), item("c")])
            .await
            .unwrap();

        let ids: Vec<_> = out.iter().map(|i| i.chunk_id.clone()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(out.iter().all(|i| i.source == EvidenceSource::Reranked));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unmentioned_candidates_are_appended_not_dropped() {
        // Model forgets "b": it must still come back, last, in its original
        // relative position among the forgotten.
        let llm = CountingGenerator::new("{\"ranked_ids\": [\"c\", \"a\"]}");
        let reranker = LlmReranker::new(llm, RerankConfig::default());

        let out = reranker
            .rerank("q", vec![item("a"), item("b"), item("c")])
            .await
            .unwrap();

        let ids: Vec<_> = out.iter().map(|i| i.chunk_id.clone()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(out[2].source, EvidenceSource::Hybrid);
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_ids_are_tolerated() {
        let llm =
            CountingGenerator::new("{\"ranked_ids\": [\"ghost\", \"b\", \"b\", \"a\"]}");
        let reranker = LlmReranker::new(llm, RerankConfig::default());

        let out = reranker.rerank("q", vec![item("a"), item("b")]).await.unwrap();
        let ids: Vec<_> = out.iter().map(|i| i.chunk_id.clone()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_prose_wrapped_json_is_parsed() {
        let llm = CountingGenerator::new(
            "Sure! Here is the ranking:\n{\"ranked_ids\": [\"b\", \"a\"]}\nHope that helps.",
        );
        let reranker = LlmReranker::new(llm, RerankConfig::default());

        let out = reranker.rerank("q", vec![item("a"), item("b")]).await.unwrap();
        assert_eq!(out[0].chunk_id, "b");
    }

    #[tokio::test]
    async fn test_unusable_output_keeps_original_order() {
        for garbage in [
            "no json here at all",
            "{\"ranked\": [1, 2]}",
            "{\"ranked_ids\": \"not-a-list\"}",
            "{\"ranked_ids\": [1, 2]}",
            "{\"ranked_ids\": [\"  \"]}",
        ] {
            let llm = CountingGenerator::new(garbage);
            let reranker = LlmReranker::new(llm, RerankConfig::default());
            let out = reranker.rerank("q", vec![item("a"), item("b")]).await.unwrap();
            let ids: Vec<_> = out.iter().map(|i| i.chunk_id.clone()).collect();
            assert_eq!(ids, vec!["a", "b"], "garbage case: {garbage}");
            assert!(out.iter().all(|i| i.source == EvidenceSource::Hybrid));
        }
    }

    #[tokio::test]
    async fn test_truncates_to_top_n() {
        let llm = CountingGenerator::new("{\"ranked_ids\": [\"c\", \"b\", \"a\", \"d\"]}");
        let cfg = RerankConfig {
            top_n: 2,
            ..Default::default()
        };
        let reranker = LlmReranker::new(llm, cfg);

        let out = reranker
            .rerank("q", vec![item("a"), item("b"), item("c"), item("d")])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].chunk_id, "c");
    }

    #[tokio::test]
    async fn test_max_candidates_bounds_model_input() {
        let llm = CountingGenerator::new("{\"ranked_ids\": [\"a\"]}");
        let cfg = RerankConfig {
            max_candidates: 1,
            ..Default::default()
        };
        let reranker = LlmReranker::new(llm.clone(), cfg);

        // Truncation to one candidate means no model call at all
        let out = reranker.rerank("q", vec![item("a"), item("b")]).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_noop_reranker_keeps_order() {
        let reranker = NoopReranker::new(RerankConfig {
            top_n: 2,
            ..Default::default()
        });
        let out = reranker
            .rerank("q", vec![item("a"), item("b"), item("c")])
            .await
            .unwrap();
        let ids: Vec<_> = out.iter().map(|i| i.chunk_id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_candidate_id_fallback() {
        let mut it = item("");
        it.claim_no = Some(7);
        assert_eq!(candidate_id(&it), "US1:claim:7");
        it.claim_no = None;
        assert_eq!(candidate_id(&it), "US1:claim:none");
        it.chunk_id = "chunk-9".to_string();
        assert_eq!(candidate_id(&it), "chunk-9");
    }

    #[test]
    fn test_snippet_truncation_is_char_boundary_safe() {
        let text = "日本語のテキストです".repeat(50);
        let snippet = make_snippet(&text, 100);
        assert!(snippet.chars().count() <= 100);
        assert!(snippet.ends_with("..."));

        let short = make_snippet("short", 100);
        assert_eq!(short, "short");
    }
}
