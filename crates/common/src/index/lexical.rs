//! Lexical BM25 index client
//!
//! REST client for an Elasticsearch-compatible cluster holding patent-level
//! documents. Builds a `multi_match` query over weighted fields plus
//! term/terms/range filter clauses translated from the typed filter.

use super::SparseIndex;
use crate::config::LexicalIndexConfig;
use crate::errors::{AppError, Result};
use crate::types::{ScoredMatch, SearchFilter};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

pub struct LexicalIndexClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    index_name: String,
}

#[derive(Deserialize)]
struct SearchResponseBody {
    hits: HitsBody,
}

#[derive(Deserialize)]
struct HitsBody {
    #[serde(default)]
    hits: Vec<HitBody>,
}

#[derive(Deserialize)]
struct HitBody {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

impl LexicalIndexClient {
    pub fn new(config: &LexicalIndexConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(AppError::Configuration {
                message: "lexical_index.endpoint is required".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            index_name: config.index_name.clone(),
        })
    }
}

#[async_trait]
impl SparseIndex for LexicalIndexClient {
    async fn search_bm25(
        &self,
        query_text: &str,
        top_k: usize,
        filter: &SearchFilter,
        fields: &[&str],
    ) -> Result<Vec<ScoredMatch>> {
        if query_text.trim().is_empty() {
            return Err(AppError::validation("query_text is required", Some("query_text")));
        }
        if top_k == 0 {
            return Err(AppError::validation("top_k must be > 0", Some("top_k")));
        }

        let mut query = json!({
            "bool": {
                "must": [
                    {
                        "multi_match": {
                            "query": query_text,
                            "fields": fields,
                            "type": "best_fields",
                        }
                    }
                ]
            }
        });

        let clauses = filter_clauses(filter);
        if !clauses.is_empty() {
            query["bool"]["filter"] = Value::Array(clauses);
        }

        let url = format!("{}/{}/_search", self.endpoint, self.index_name);
        let body = json!({ "query": query, "size": top_k });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("ApiKey {}", key));
        }

        let response = request.send().await.map_err(|e| AppError::LexicalIndex {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LexicalIndex {
                message: format!("API error {}: {}", status, body),
            });
        }

        let body: SearchResponseBody = response.json().await.map_err(|e| {
            AppError::LexicalIndex {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        Ok(body
            .hits
            .hits
            .into_iter()
            .map(|hit| ScoredMatch::new(hit.id, hit.score.unwrap_or(0.0), hit.source))
            .collect())
    }
}

/// Translate the typed filter into term/terms/range clauses.
fn filter_clauses(filter: &SearchFilter) -> Vec<Value> {
    let mut clauses = Vec::new();

    if let Some(level) = filter.level {
        clauses.push(json!({ "term": { "level": level.as_str() } }));
    }
    if let Some(ids) = &filter.patent_id_in {
        clauses.push(json!({ "terms": { "patent_id": ids } }));
    }
    if filter.year_from.is_some() || filter.year_to.is_some() {
        let mut range = Map::new();
        if let Some(from) = filter.year_from {
            range.insert("gte".to_string(), json!(from));
        }
        if let Some(to) = filter.year_to {
            range.insert("lte".to_string(), json!(to));
        }
        clauses.push(json!({ "range": { "filing_year": range } }));
    }
    if let Some(cpc) = &filter.cpc_in {
        clauses.push(json!({ "terms": { "cpc": cpc } }));
    }
    if let Some(assignees) = &filter.assignee_in {
        clauses.push(json!({ "terms": { "assignee": assignees } }));
    }

    for (key, value) in &filter.extra {
        if let Some(clause) = extra_clause(key, value) {
            clauses.push(clause);
        }
    }

    clauses
}

/// Translate one raw passthrough clause. Equality maps to `term`,
/// `$in` to `terms`, comparison operators to `range`; unrecognized
/// shapes are skipped rather than erroring.
fn extra_clause(key: &str, value: &Value) -> Option<Value> {
    match value {
        Value::Object(ops) => {
            if let Some(members) = ops.get("$in") {
                return Some(json!({ "terms": { key: members } }));
            }
            let mut range = Map::new();
            for (op, bound) in ops {
                match op.as_str() {
                    "$gte" => range.insert("gte".to_string(), bound.clone()),
                    "$lte" => range.insert("lte".to_string(), bound.clone()),
                    "$gt" => range.insert("gt".to_string(), bound.clone()),
                    "$lt" => range.insert("lt".to_string(), bound.clone()),
                    _ => None,
                };
            }
            if range.is_empty() {
                None
            } else {
                Some(json!({ "range": { key: range } }))
            }
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            Some(json!({ "term": { key: value } }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Level;

    #[test]
    fn test_typed_filter_clauses() {
        let filter = SearchFilter::new()
            .with_level(Level::Patent)
            .with_cpc(vec!["G06N".into()]);
        let clauses = filter_clauses(&filter);
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0], json!({ "term": { "level": "patent" } }));
        assert_eq!(clauses[1], json!({ "terms": { "cpc": ["G06N"] } }));
    }

    #[test]
    fn test_range_clause() {
        let filter = SearchFilter::new().with_year_range(Some(2010), Some(2020));
        let clauses = filter_clauses(&filter);
        assert_eq!(
            clauses[0],
            json!({ "range": { "filing_year": { "gte": 2010, "lte": 2020 } } })
        );
    }

    #[test]
    fn test_extra_clause_shapes() {
        assert_eq!(
            extra_clause("status", &json!("granted")),
            Some(json!({ "term": { "status": "granted" } }))
        );
        assert_eq!(
            extra_clause("cpc", &json!({ "$in": ["G06N", "H04L"] })),
            Some(json!({ "terms": { "cpc": ["G06N", "H04L"] } }))
        );
        assert_eq!(
            extra_clause("filing_year", &json!({ "$gte": 2015 })),
            Some(json!({ "range": { "filing_year": { "gte": 2015 } } }))
        );
    }

    #[test]
    fn test_unrecognized_extra_shapes_are_ignored() {
        assert_eq!(extra_clause("weird", &json!({ "$regex": ".*" })), None);
        assert_eq!(extra_clause("also_weird", &json!([1, 2, 3])), None);
        assert_eq!(extra_clause("null_valued", &json!(null)), None);
    }
}
