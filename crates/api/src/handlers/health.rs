//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub vector_index: CheckResult,
    pub embedding: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn up(latency_ms: Option<u64>) -> Self {
        Self {
            status: "up".to_string(),
            latency_ms,
            error: None,
        }
    }

    fn down(error: String) -> Self {
        Self {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(error),
        }
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "claimsight-api".to_string(),
    })
}

/// Readiness probe - checks dependencies and required configuration
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = std::time::Instant::now();

    let db_check = match state.db.ping().await {
        Ok(_) => CheckResult::up(Some(start.elapsed().as_millis() as u64)),
        Err(e) => CheckResult::down(e.to_string()),
    };

    let vector_check = if state
        .config
        .vector_index
        .api_key
        .as_deref()
        .is_some_and(|k| !k.is_empty())
    {
        CheckResult::up(None)
    } else {
        CheckResult::down("vector index API key not configured".to_string())
    };

    // Mock providers are valid in development, so only flag the openai
    // provider when its key is missing
    let embedding_check = if state.config.embedding.provider == "openai"
        && !state
            .config
            .embedding
            .api_key
            .as_deref()
            .is_some_and(|k| !k.is_empty())
    {
        CheckResult::down("embedding API key not configured".to_string())
    } else {
        CheckResult::up(None)
    };

    let all_healthy = db_check.status == "up"
        && vector_check.status == "up"
        && embedding_check.status == "up";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            database: db_check,
            vector_index: vector_check,
            embedding: embedding_check,
        },
    })
}
