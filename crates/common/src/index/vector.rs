//! Dense vector index client
//!
//! REST client for a managed vector index service. Runs in dual-index mode:
//! separate indexes for patent-level and claim-level chunks, with queries
//! routed by the filter's hierarchy level.

use super::DenseIndex;
use crate::config::VectorIndexConfig;
use crate::errors::{AppError, Result};
use crate::types::{Level, ScoredMatch, SearchFilter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

pub struct VectorIndexClient {
    client: reqwest::Client,
    api_key: String,
    patent_index_host: String,
    claim_index_host: String,
    namespace: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    top_k: usize,
    vector: &'a [f32],
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct QueryResponseBody {
    #[serde(default)]
    matches: Vec<MatchBody>,
}

#[derive(Deserialize)]
struct MatchBody {
    id: String,
    #[serde(default)]
    score: f64,
    // The index omits metadata (or sends null) for vectors upserted bare
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

impl VectorIndexClient {
    pub fn new(config: &VectorIndexConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "vector_index.api_key is required".to_string(),
            })?;
        if config.patent_index_host.is_empty() || config.claim_index_host.is_empty() {
            return Err(AppError::Configuration {
                message: "vector_index requires both patent_index_host and claim_index_host"
                    .to_string(),
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
            api_key,
            patent_index_host: config.patent_index_host.clone(),
            claim_index_host: config.claim_index_host.clone(),
            namespace: config.namespace.clone(),
        })
    }

    /// Pick the index for the requested hierarchy level. The patent index
    /// holds only patent-level documents; everything finer lives in the
    /// claim index.
    fn index_host(&self, filter: &SearchFilter) -> &str {
        match filter.level {
            Some(Level::Patent) => &self.patent_index_host,
            _ => &self.claim_index_host,
        }
    }
}

#[async_trait]
impl DenseIndex for VectorIndexClient {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredMatch>> {
        if vector.is_empty() {
            return Err(AppError::validation(
                "dense query vector required",
                Some("vector"),
            ));
        }
        if top_k == 0 {
            return Err(AppError::validation("top_k must be > 0", Some("top_k")));
        }

        let host = self.index_host(filter);
        let url = format!("{}/query", host.trim_end_matches('/'));

        let request = QueryRequest {
            namespace: &self.namespace,
            top_k,
            vector,
            include_metadata: true,
            filter: metadata_filter(filter),
        };

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorIndex {
                message: format!("API error {}: {}", status, body),
            });
        }

        let body: QueryResponseBody = response.json().await.map_err(|e| {
            AppError::VectorIndex {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        Ok(body
            .matches
            .into_iter()
            .map(|m| ScoredMatch::new(m.id, m.score, m.metadata.unwrap_or_default()))
            .collect())
    }
}

/// Translate the typed filter into the index's Mongo-style operator JSON.
/// Returns `None` when no clause applies.
fn metadata_filter(filter: &SearchFilter) -> Option<Value> {
    let mut clauses = Map::new();

    if let Some(level) = filter.level {
        clauses.insert("level".to_string(), json!(level.as_str()));
    }
    if let Some(ids) = &filter.patent_id_in {
        clauses.insert("patent_id".to_string(), json!({ "$in": ids }));
    }
    if filter.year_from.is_some() || filter.year_to.is_some() {
        let mut range = Map::new();
        if let Some(from) = filter.year_from {
            range.insert("$gte".to_string(), json!(from));
        }
        if let Some(to) = filter.year_to {
            range.insert("$lte".to_string(), json!(to));
        }
        clauses.insert("filing_year".to_string(), Value::Object(range));
    }
    if let Some(cpc) = &filter.cpc_in {
        clauses.insert("cpc".to_string(), json!({ "$in": cpc }));
    }
    if let Some(assignees) = &filter.assignee_in {
        clauses.insert("assignee".to_string(), json!({ "$in": assignees }));
    }

    for (key, value) in &filter.extra {
        if let Some(clause) = sanitize_extra_clause(value) {
            clauses.insert(key.clone(), clause);
        }
    }

    if clauses.is_empty() {
        None
    } else {
        Some(Value::Object(clauses))
    }
}

/// Keep recognized operator shapes from a raw passthrough clause; anything
/// else is dropped rather than erroring, so new filter shapes degrade to
/// no-ops instead of breaking old deployments.
fn sanitize_extra_clause(value: &Value) -> Option<Value> {
    match value {
        Value::Object(ops) => {
            let kept: Map<String, Value> = ops
                .iter()
                .filter(|(op, _)| {
                    matches!(op.as_str(), "$in" | "$gte" | "$lte" | "$gt" | "$lt")
                })
                .map(|(op, v)| (op.clone(), v.clone()))
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Value::Object(kept))
            }
        }
        // Plain scalar equality
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Some(value.clone()),
        _ => None,
    }
}
