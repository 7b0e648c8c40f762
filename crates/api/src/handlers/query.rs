//! Query handler
//!
//! Main endpoint for prior art search, infringement-style element matching
//! (when the caller supplies a system description or mentions infringement),
//! and landscape summaries (when the query asks for trends or an overview).

use crate::AppState;
use axum::{extract::State, Json};
use claimsight_common::{
    errors::{AppError, Result},
    metrics,
    types::SearchFilter,
};
use claimsight_retrieval::{QueryMode, QueryOptions, QueryResponse};
use serde::Deserialize;
use std::time::Instant;
use validator::Validate;

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    /// User query, e.g. a prior art or infringement question
    #[validate(length(min = 3, max = 2000))]
    pub query: String,

    /// Optional product/system description for infringement-style matching
    pub system_description: Option<String>,

    #[serde(default)]
    pub filters: Option<QueryFilters>,

    #[serde(default)]
    pub options: RequestOptions,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryFilters {
    /// CPC classification prefixes, e.g. ["G06N"]
    pub cpc_prefixes: Option<Vec<String>>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub assignees: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct RequestOptions {
    /// Use two-stage hierarchical retrieval (default) or flat dense search
    #[serde(default = "default_true")]
    pub hierarchical: bool,

    /// Apply LLM reranking to the retrieved evidence
    #[serde(default = "default_true")]
    pub rerank: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            hierarchical: true,
            rerank: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Execute a patent discovery query
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let mode = infer_mode(&request.query, request.system_description.as_deref());
    let filter = to_search_filter(request.filters.as_ref());

    let opts = QueryOptions {
        mode,
        filter,
        flat_retrieval: !request.options.hierarchical,
        skip_reranking: !request.options.rerank,
    };

    let response = state.orchestrator.query(&request.query, opts).await?;

    let elapsed = start.elapsed().as_secs_f64();
    metrics::record_query(elapsed, mode.as_str(), response.evidence.len());

    tracing::info!(
        mode = mode.as_str(),
        evidence = response.evidence.len(),
        latency_ms = (elapsed * 1000.0) as u64,
        "Query completed"
    );

    Ok(Json(response))
}

/// Infer the query mode from the request shape: a system description (or
/// explicit mention of infringement) signals infringement analysis, and
/// summary/trend phrasing signals a landscape overview.
fn infer_mode(query: &str, system_description: Option<&str>) -> QueryMode {
    if system_description.is_some_and(|d| !d.trim().is_empty()) {
        return QueryMode::Infringement;
    }

    let lowered = query.to_lowercase();
    if lowered.contains("infring") {
        return QueryMode::Infringement;
    }
    const LANDSCAPE_CUES: &[&str] = &["landscape", "trend", "overview", "summary", "summarize"];
    if LANDSCAPE_CUES.iter().any(|cue| lowered.contains(cue)) {
        return QueryMode::Landscape;
    }

    QueryMode::PriorArt
}

fn to_search_filter(filters: Option<&QueryFilters>) -> SearchFilter {
    let Some(filters) = filters else {
        return SearchFilter::new();
    };

    let mut filter = SearchFilter::new().with_year_range(filters.year_from, filters.year_to);
    if let Some(cpc) = &filters.cpc_prefixes {
        filter = filter.with_cpc(cpc.clone());
    }
    if let Some(assignees) = &filters.assignees {
        filter = filter.with_assignees(assignees.clone());
    }
    filter
}
