//! Analysis pipeline: prompt, one model call, JSON recovery.

pub mod extract;
pub mod prompt;
pub mod report;

pub use extract::{extract_json_text, parse_reply, ExtractError};
pub use prompt::build_prompt;
pub use report::{AnalysisReport, CategoryScore, MinorityScore, CATEGORY_KEYS};

use crate::provider::{GenerateRequest, Provider, ProviderError};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single analysis. Every variant is terminal for the request.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no text provided")]
    EmptyText,

    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("invalid model response: {0}")]
    InvalidResponse(#[from] ExtractError),
}

/// Stateless analyzer shared by all requests.
pub struct Analyzer {
    provider: Arc<dyn Provider>,
}

impl Analyzer {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Name and model of the backing provider, for logs.
    pub fn provider_label(&self) -> String {
        format!("{}:{}", self.provider.name(), self.provider.model())
    }

    /// Run the full pipeline for one piece of text.
    ///
    /// The returned object is the model's reply as parsed; schema drift is
    /// logged but not rejected.
    pub async fn analyze(&self, text: &str) -> Result<Value, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyText);
        }

        let prompt = build_prompt(text);
        let response = self.provider.generate(GenerateRequest::new(prompt)).await?;

        tracing::debug!(
            provider = %response.provider,
            model = %response.model,
            latency_ms = response.latency_ms,
            output_tokens = response.usage.output_tokens,
            finish_reason = ?response.finish_reason,
            "Model replied"
        );

        let value = parse_reply(&response.content).map_err(|e| {
            tracing::warn!(
                error = %e,
                reply_len = response.content.len(),
                "Could not extract JSON from model reply"
            );
            e
        })?;

        if let Some(drift) = AnalysisReport::drift(&value) {
            tracing::warn!(drift = %drift, "Model reply deviates from the requested schema");
        }

        Ok(value)
    }
}
