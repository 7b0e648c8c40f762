//! ClaimSight API
//!
//! The entry point for patent discovery queries. Handles:
//! - Request validation and routing
//! - Wiring the retrieval pipeline's collaborators
//! - Observability (logging, metrics, tracing)

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use claimsight_common::{
    config::AppConfig,
    db::{ChunkTextStore, DbPool, Repository},
    embeddings::create_embedder,
    index::{LexicalIndexClient, SparseIndex, VectorIndexClient},
    llm::create_generator,
    metrics,
};
use claimsight_retrieval::{
    fusion::FusionPolicy, HierarchicalConfig, LlmReranker, NoopReranker, RagOrchestrator,
    RagPolicy, RerankConfig, Reranker,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub orchestrator: Arc<RagOrchestrator>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();

    info!("Starting ClaimSight API v{}", claimsight_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .with_http_listener(addr)
            .install()?;
        info!("Prometheus exporter listening on {}", addr);
    }

    // Initialize database connection (canonical chunk store)
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let chunk_store: Arc<dyn ChunkTextStore> = Arc::new(Repository::new(db.clone()));

    // Backend clients
    let dense_index = Arc::new(VectorIndexClient::new(&config.vector_index)?);
    let sparse_index: Option<Arc<dyn SparseIndex>> = if config.lexical_index.endpoint.is_empty() {
        warn!("lexical_index.endpoint not set, sparse retrieval disabled");
        None
    } else {
        Some(Arc::new(LexicalIndexClient::new(&config.lexical_index)?))
    };

    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;

    // Retrieval pipeline
    let rerank_cfg = RerankConfig {
        max_candidates: config.rerank.max_candidates,
        top_n: config.rerank.top_n,
        snippet_chars: config.rerank.snippet_chars,
    };
    let reranker: Arc<dyn Reranker> = if config.rerank.enabled {
        Arc::new(LlmReranker::new(generator.clone(), rerank_cfg))
    } else {
        warn!("Reranking disabled by configuration");
        Arc::new(NoopReranker::new(rerank_cfg))
    };

    let hierarchical_cfg = HierarchicalConfig {
        patent_top_k: config.retrieval.patent_top_k,
        claim_top_k: config.retrieval.claim_top_k,
        rrf_k: config.retrieval.rrf_k,
        dense_top_k: config.retrieval.dense_top_k,
        sparse_top_k: config.retrieval.sparse_top_k,
        fusion_policy: if config.retrieval.sparse_allowlist {
            FusionPolicy::SparseAllowlist
        } else {
            FusionPolicy::Independent
        },
    };

    let orchestrator = Arc::new(RagOrchestrator::new(
        embedder,
        generator,
        dense_index,
        sparse_index,
        chunk_store,
        reranker,
        hierarchical_cfg,
        RagPolicy {
            final_top_n: config.rag.final_top_n,
        },
    ));

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        orchestrator,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new().route("/query", post(handlers::query::query));

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
