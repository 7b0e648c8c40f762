//! Evidence assembly
//!
//! Retrieval hits carry only metadata and snippets; the canonical chunk
//! text lives in the document store. Assembly hydrates every hit in one
//! batched lookup and maps the result into the public evidence schema.
//! A partially populated store degrades gracefully: ids the store does not
//! know fall back to the hit's own metadata text.

use crate::types::{EvidenceItem, EvidenceSource};
use claimsight_common::db::ChunkTextStore;
use claimsight_common::errors::Result;
use claimsight_common::types::{Level, ScoredMatch};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct EvidenceAssembler {
    store: Arc<dyn ChunkTextStore>,
}

impl EvidenceAssembler {
    pub fn new(store: Arc<dyn ChunkTextStore>) -> Self {
        Self { store }
    }

    /// Hydrate matches into evidence items, labelled with the retrieval
    /// stage that produced them.
    pub async fn assemble(
        &self,
        matches: &[ScoredMatch],
        source: EvidenceSource,
    ) -> Result<Vec<EvidenceItem>> {
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        // One batched lookup for all hits, never per-item queries
        let ids: Vec<String> = matches.iter().map(chunk_key).collect();
        let docs = self.store.get_chunks_by_ids(&ids).await?;
        debug!(requested = ids.len(), hydrated = docs.len(), "Chunk store lookup complete");

        let items = matches
            .iter()
            .map(|m| {
                let key = chunk_key(m);
                let doc = docs.get(&key);

                // Canonical text when the store has it, else the hit's own
                // text/snippet payload
                let text = doc
                    .map(|d| d.text.clone())
                    .or_else(|| m.meta_str("text").map(str::to_string))
                    .or_else(|| m.meta_str("snippet").map(str::to_string))
                    .unwrap_or_default();

                // Retrieval metadata is authoritative; the store document
                // only back-fills what the index never recorded
                let patent_id = m
                    .meta_str("patent_id")
                    .map(str::to_string)
                    .or_else(|| doc.map(|d| d.patent_id.clone()))
                    .unwrap_or_default();

                let level = m
                    .meta_str("level")
                    .and_then(Level::parse)
                    .or_else(|| doc.and_then(|d| d.level))
                    .unwrap_or(Level::Claim);

                let title = m
                    .meta_str("title")
                    .map(str::to_string)
                    .or_else(|| doc.and_then(|d| d.title.clone()));

                let claim_no = m
                    .metadata
                    .get("claim_no")
                    .and_then(Value::as_i64)
                    .map(|n| n as i32)
                    .or_else(|| doc.and_then(|d| d.claim_no));

                EvidenceItem {
                    chunk_id: key,
                    patent_id,
                    level,
                    title,
                    claim_no,
                    text,
                    score: m.score,
                    source,
                    metadata: m.metadata.clone(),
                }
            })
            .collect();

        Ok(items)
    }
}

/// Store lookup key: the metadata `chunk_id` when the source recorded one,
/// else the hit's own id.
fn chunk_key(m: &ScoredMatch) -> String {
    m.meta_str("chunk_id").unwrap_or(&m.id).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use claimsight_common::db::ChunkDocument;
    use serde_json::{json, Map};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedStore {
        docs: HashMap<String, ChunkDocument>,
        calls: AtomicUsize,
    }

    impl ScriptedStore {
        fn new(docs: Vec<ChunkDocument>) -> Arc<Self> {
            Arc::new(Self {
                docs: docs.into_iter().map(|d| (d.chunk_id.clone(), d)).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChunkTextStore for ScriptedStore {
        async fn get_chunks_by_ids(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, ChunkDocument>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ids
                .iter()
                .filter_map(|id| self.docs.get(id).cloned().map(|d| (id.clone(), d)))
                .collect())
        }
    }

    fn doc(chunk_id: &str, text: &str) -> ChunkDocument {
        ChunkDocument {
            chunk_id: chunk_id.to_string(),
            patent_id: "US1".to_string(),
            level: Some(Level::Claim),
            title: Some("Stored title".to_string()),
            claim_no: Some(3),
            text: text.to_string(),
        }
    }

    fn hit(id: &str, extra: &[(&str, Value)]) -> ScoredMatch {
        let mut metadata = Map::new();
        for (k, v) in extra {
            metadata.insert(k.to_string(), v.clone());
        }
        ScoredMatch::new(id, 0.8, metadata)
    }

    #[tokio::test]
    async fn test_hydrates_canonical_text_in_one_lookup() {
        let store = ScriptedStore::new(vec![doc("c1", "full canonical text"), doc("c2", "other")]);
        let assembler = EvidenceAssembler::new(store.clone());

        let matches = vec![
            hit("c1", &[("snippet", json!("trunc..."))]),
            hit("c2", &[]),
        ];
        let items = assembler
            .assemble(&matches, EvidenceSource::Hybrid)
            .await
            .unwrap();

        assert_eq!(items[0].text, "full canonical text");
        assert_eq!(items[1].text, "other");
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_miss_falls_back_to_metadata_text() {
        let store = ScriptedStore::new(vec![]);
        let assembler = EvidenceAssembler::new(store);

        let matches = vec![
            hit("missing-1", &[("text", json!("from metadata"))]),
            hit("missing-2", &[("snippet", json!("from snippet"))]),
            hit("missing-3", &[]),
        ];
        let items = assembler
            .assemble(&matches, EvidenceSource::Dense)
            .await
            .unwrap();

        assert_eq!(items[0].text, "from metadata");
        assert_eq!(items[1].text, "from snippet");
        assert_eq!(items[2].text, "");
    }

    #[tokio::test]
    async fn test_match_metadata_is_authoritative_over_store() {
        let store = ScriptedStore::new(vec![doc("c1", "text")]);
        let assembler = EvidenceAssembler::new(store);

        let matches = vec![hit(
            "c1",
            &[
                ("patent_id", json!("US-FROM-INDEX")),
                ("title", json!("Index title")),
                ("claim_no", json!(9)),
                ("level", json!("limitation")),
            ],
        )];
        let items = assembler
            .assemble(&matches, EvidenceSource::Hybrid)
            .await
            .unwrap();

        assert_eq!(items[0].patent_id, "US-FROM-INDEX");
        assert_eq!(items[0].title.as_deref(), Some("Index title"));
        assert_eq!(items[0].claim_no, Some(9));
        assert_eq!(items[0].level, Level::Limitation);
    }

    #[tokio::test]
    async fn test_store_backfills_absent_metadata_fields() {
        let store = ScriptedStore::new(vec![doc("c1", "text")]);
        let assembler = EvidenceAssembler::new(store);

        let items = assembler
            .assemble(&[hit("c1", &[])], EvidenceSource::Hybrid)
            .await
            .unwrap();

        assert_eq!(items[0].patent_id, "US1");
        assert_eq!(items[0].title.as_deref(), Some("Stored title"));
        assert_eq!(items[0].claim_no, Some(3));
        assert_eq!(items[0].level, Level::Claim);
    }

    #[tokio::test]
    async fn test_chunk_id_metadata_overrides_surrogate_id() {
        let store = ScriptedStore::new(vec![doc("real-chunk", "resolved")]);
        let assembler = EvidenceAssembler::new(store);

        let items = assembler
            .assemble(
                &[hit("surrogate-7", &[("chunk_id", json!("real-chunk"))])],
                EvidenceSource::Hybrid,
            )
            .await
            .unwrap();

        assert_eq!(items[0].chunk_id, "real-chunk");
        assert_eq!(items[0].text, "resolved");
    }

    #[tokio::test]
    async fn test_empty_input_skips_store() {
        let store = ScriptedStore::new(vec![]);
        let assembler = EvidenceAssembler::new(store.clone());
        let items = assembler.assemble(&[], EvidenceSource::Hybrid).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }
}
