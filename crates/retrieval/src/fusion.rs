//! Reciprocal Rank Fusion (RRF) for combining search results
//!
//! RRF merges two ranked lists by rank position alone, so it needs no score
//! normalization and is robust to the very different score distributions of
//! vector similarity and BM25.

use claimsight_common::types::ScoredMatch;
use std::collections::{HashMap, HashSet};

/// How the dense and sparse patent-level sources are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FusionPolicy {
    /// Both sources contribute independently.
    #[default]
    Independent,
    /// Dense hits are kept only for patents the lexical source also saw.
    SparseAllowlist,
}

/// Join key for fusion at patent granularity.
///
/// The same patent can appear in both lists under different surrogate ids
/// (the vector index keys chunks, the lexical index keys documents), so
/// merging happens on the `patent_id` metadata field, falling back to the
/// raw id when the source did not record one.
pub fn join_key(m: &ScoredMatch) -> &str {
    m.patent_id().unwrap_or(&m.id)
}

fn rrf_term(k: u32, rank: usize) -> f64 {
    1.0 / (f64::from(k) + rank as f64)
}

struct Slot {
    score: f64,
    record: ScoredMatch,
    from_sparse: bool,
}

/// Fuse dense and sparse results using RRF.
///
/// Each key scores the sum of `1/(k + rank)` over the lists containing it
/// (rank is 1-based); keys present in only one list still contribute their
/// single term. Output is deduplicated by join key, sorted by descending
/// fused score with first-seen input order breaking ties, and truncated to
/// `top_k`. When a key appears in both lists the sparse hit's id and
/// metadata are kept: the lexical source returns the full stored document,
/// not a vector-index side payload.
///
/// Pure and stateless; never invents ids absent from both inputs.
pub fn fuse_rrf(
    dense_results: &[ScoredMatch],
    sparse_results: &[ScoredMatch],
    k: u32,
    top_k: usize,
) -> Vec<ScoredMatch> {
    let mut order: Vec<String> = Vec::new();
    let mut slots: HashMap<String, Slot> = HashMap::new();

    for (rank, m) in dense_results.iter().enumerate() {
        let key = join_key(m).to_string();
        let term = rrf_term(k, rank + 1);
        match slots.get_mut(&key) {
            Some(slot) => slot.score += term,
            None => {
                order.push(key.clone());
                slots.insert(
                    key,
                    Slot {
                        score: term,
                        record: m.clone(),
                        from_sparse: false,
                    },
                );
            }
        }
    }

    for (rank, m) in sparse_results.iter().enumerate() {
        let key = join_key(m).to_string();
        let term = rrf_term(k, rank + 1);
        match slots.get_mut(&key) {
            Some(slot) => {
                slot.score += term;
                if !slot.from_sparse {
                    // Lexical metadata is the metadata of record
                    slot.record = m.clone();
                    slot.from_sparse = true;
                }
            }
            None => {
                order.push(key.clone());
                slots.insert(
                    key,
                    Slot {
                        score: term,
                        record: m.clone(),
                        from_sparse: true,
                    },
                );
            }
        }
    }

    let mut fused: Vec<ScoredMatch> = order
        .iter()
        .map(|key| {
            let slot = &slots[key];
            ScoredMatch::new(slot.record.id.clone(), slot.score, slot.record.metadata.clone())
        })
        .collect();

    // Stable sort keeps first-seen order for equal scores
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(top_k);
    fused
}

/// Apply the sparse-allowlist policy: drop dense hits whose patents the
/// lexical source never saw. A no-op when the sparse list is empty so the
/// dense-only path (no query text) keeps working.
pub fn apply_allowlist(
    dense_results: Vec<ScoredMatch>,
    sparse_results: &[ScoredMatch],
) -> Vec<ScoredMatch> {
    if sparse_results.is_empty() {
        return dense_results;
    }
    let allowed: HashSet<&str> = sparse_results.iter().map(join_key).collect();
    dense_results
        .into_iter()
        .filter(|m| allowed.contains(join_key(m)))
        .collect()
}
