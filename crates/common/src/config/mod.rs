//! Configuration management for ClaimSight services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration (canonical chunk store)
    pub database: DatabaseConfig,

    /// Vector index configuration (dense retrieval)
    pub vector_index: VectorIndexConfig,

    /// Lexical index configuration (sparse BM25 retrieval)
    pub lexical_index: LexicalIndexConfig,

    /// Embedding service configuration
    pub embedding: EmbeddingConfig,

    /// LLM generation configuration
    pub generation: GenerationConfig,

    /// Retrieval pipeline configuration
    pub retrieval: RetrievalSettings,

    /// Reranking configuration
    pub rerank: RerankSettings,

    /// Final evidence selection policy
    pub rag: RagSettings,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

/// Dual-index mode: separate vector indexes for patent-level and claim-level
/// chunks; queries are routed by the filter's hierarchy level.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorIndexConfig {
    /// API key for the vector index service
    pub api_key: Option<String>,

    /// Endpoint of the patent-level index
    pub patent_index_host: String,

    /// Endpoint of the claim-level index
    pub claim_index_host: String,

    /// Namespace within the indexes
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Request timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LexicalIndexConfig {
    /// Endpoint of the lexical search cluster
    pub endpoint: String,

    /// API key for the lexical search cluster
    pub api_key: Option<String>,

    /// Index name holding patent-level documents
    #[serde(default = "default_lexical_index_name")]
    pub index_name: String,

    /// Request timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// API key for the generation service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Maximum output tokens per response
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

/// Hierarchical retrieval tuning.
///
/// Defaults are tuned for a corpus of roughly a hundred patent-level and a
/// few thousand claim-level chunks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalSettings {
    /// Patents kept after patent-stage fusion
    #[serde(default = "default_patent_top_k")]
    pub patent_top_k: usize,

    /// Claims returned by the claim stage
    #[serde(default = "default_claim_top_k")]
    pub claim_top_k: usize,

    /// RRF smoothing constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Per-source fan-out before fusion (dense)
    #[serde(default = "default_dense_top_k")]
    pub dense_top_k: usize,

    /// Per-source fan-out before fusion (sparse)
    #[serde(default = "default_sparse_top_k")]
    pub sparse_top_k: usize,

    /// Restrict dense patent hits to patents the lexical source also saw
    #[serde(default)]
    pub sparse_allowlist: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankSettings {
    /// Enable LLM reranking
    #[serde(default = "default_rerank_enabled")]
    pub enabled: bool,

    /// Candidates offered to the reranker
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Items returned after reranking
    #[serde(default = "default_rerank_top_n")]
    pub top_n: usize,

    /// Evidence text truncation for the rerank prompt
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RagSettings {
    /// Evidence items surviving to the answer stage
    #[serde(default = "default_final_top_n")]
    pub final_top_n: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_namespace() -> String { "default".to_string() }
fn default_index_timeout() -> u64 { 30 }
fn default_lexical_index_name() -> String { "patents".to_string() }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 5 }
fn default_backoff_base_ms() -> u64 { 700 }
fn default_generation_model() -> String { "gpt-4.1-mini".to_string() }
fn default_max_output_tokens() -> u32 { 800 }
fn default_generation_timeout() -> u64 { 60 }
fn default_generation_retries() -> u32 { 3 }
fn default_patent_top_k() -> usize { 10 }
fn default_claim_top_k() -> usize { 30 }
fn default_rrf_k() -> u32 { 30 }
fn default_dense_top_k() -> usize { 20 }
fn default_sparse_top_k() -> usize { 20 }
fn default_rerank_enabled() -> bool { true }
fn default_max_candidates() -> usize { 50 }
fn default_rerank_top_n() -> usize { 15 }
fn default_snippet_chars() -> usize { 900 }
fn default_final_top_n() -> usize { 8 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "claimsight".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/claimsight".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            vector_index: VectorIndexConfig {
                api_key: None,
                patent_index_host: String::new(),
                claim_index_host: String::new(),
                namespace: default_namespace(),
                timeout_secs: default_index_timeout(),
            },
            lexical_index: LexicalIndexConfig {
                endpoint: String::new(),
                api_key: None,
                index_name: default_lexical_index_name(),
                timeout_secs: default_index_timeout(),
            },
            embedding: EmbeddingConfig {
                provider: default_embedding_provider(),
                api_key: None,
                api_base: None,
                model: default_embedding_model(),
                dimension: default_embedding_dimension(),
                timeout_secs: default_embedding_timeout(),
                max_retries: default_embedding_retries(),
                backoff_base_ms: default_backoff_base_ms(),
            },
            generation: GenerationConfig {
                api_key: None,
                api_base: None,
                model: default_generation_model(),
                max_output_tokens: default_max_output_tokens(),
                timeout_secs: default_generation_timeout(),
                max_retries: default_generation_retries(),
                backoff_base_ms: default_backoff_base_ms(),
            },
            retrieval: RetrievalSettings {
                patent_top_k: default_patent_top_k(),
                claim_top_k: default_claim_top_k(),
                rrf_k: default_rrf_k(),
                dense_top_k: default_dense_top_k(),
                sparse_top_k: default_sparse_top_k(),
                sparse_allowlist: false,
            },
            rerank: RerankSettings {
                enabled: default_rerank_enabled(),
                max_candidates: default_max_candidates(),
                top_n: default_rerank_top_n(),
                snippet_chars: default_snippet_chars(),
            },
            rag: RagSettings {
                final_top_n: default_final_top_n(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
        }
    }
}
