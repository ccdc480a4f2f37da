//! Text-generation provider abstraction.
//!
//! The analysis pipeline talks to the model through the [`Provider`] trait so
//! the HTTP layer can be exercised against an in-process fake.

mod gemini;

pub use gemini::GeminiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Trait
// ============================================================================

/// Unified interface for text-generation providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Model this provider is configured to call.
    fn model(&self) -> &str;

    /// Send a single prompt and wait for the complete reply.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError>;
}

/// Error from a provider.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub message: String,
    pub status_code: Option<u16>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.provider, self.model, self.message)
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A single-shot generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Full prompt text
    pub prompt: String,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    /// Temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl GenerateRequest {
    /// Request with provider-default sampling settings.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Generated reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Provider name
    pub provider: String,
    /// Model used
    pub model: String,
    /// Raw reply text
    pub content: String,
    /// Token usage
    pub usage: TokenUsage,
    /// Finish reason
    pub finish_reason: Option<String>,
    /// Response latency in milliseconds
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}
