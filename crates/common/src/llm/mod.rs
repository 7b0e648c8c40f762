//! LLM generation client
//!
//! Wraps a chat-completions style API behind the `Generator` trait used by
//! answer synthesis and reranking. Retries with exponential backoff are the
//! client's responsibility; callers treat a returned error as final.

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for text generation
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text for a single prompt, with optional system instructions.
    /// Fails after the client's own retry budget is exhausted.
    async fn generate_text(&self, instructions: Option<&str>, prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI chat-completions generation client
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_output_tokens: u32,
    base_url: String,
    max_retries: u32,
    backoff_base: Duration,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIGenerator {
    /// Create a new generation client
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "generation.api_key is required".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries: config.max_retries.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        })
    }

    async fn call_with_retry(&self, request: &ChatRequest) -> Result<String> {
        let start = Instant::now();
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_base * 2_u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }

            match self.make_request(request).await {
                Ok(text) => {
                    metrics::record_generation(start.elapsed().as_secs_f64(), &self.model, true);
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Generation request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        metrics::record_generation(start.elapsed().as_secs_f64(), &self.model, false);
        Err(last_error.unwrap_or_else(|| AppError::Generation {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            AppError::Generation {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Generation {
                message: "Empty response".to_string(),
            })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn generate_text(&self, instructions: Option<&str>, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(AppError::validation("Prompt must be non-empty", Some("prompt")));
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(instructions) = instructions {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: instructions.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_output_tokens,
        };

        self.call_with_retry(&request).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock generator returning a canned response, for tests and development
pub struct MockGenerator {
    response: String,
}

impl MockGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate_text(&self, _instructions: Option<&str>, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(AppError::validation("Prompt must be non-empty", Some("prompt")));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-generation"
    }
}

/// Create a generator based on configuration; falls back to a mock when no
/// API key is configured so local development keeps working.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.api_key.as_deref() {
        Some(key) if !key.is_empty() => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        _ => {
            tracing::warn!("generation.api_key not set, using mock generator");
            Ok(Arc::new(MockGenerator::new(
                "[Mock response - generation API key not configured]",
            )))
        }
    }
}
