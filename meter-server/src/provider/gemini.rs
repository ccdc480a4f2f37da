//! Google Gemini provider.
//!
//! Calls the `generateContent` REST endpoint with the API key sent in the
//! `x-goog-api-key` header, so it never appears in URLs or transport errors.

use super::{GenerateRequest, GenerateResponse, Provider, ProviderError, TokenUsage};
use async_trait::async_trait;
use meter_common::config::LlmConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider bound to one model.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
    max_output_tokens: i64,
    client: Client,
}

// ══════════════════════════════════════════════════════════════════════════════
// API REQUEST/RESPONSE TYPES
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<i64>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<i64>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<i64>,
}

impl GeminiProvider {
    /// Create a provider from an API key and the LLM settings.
    pub fn new(api_key: impl Into<String>, llm: &LlmConfig) -> Self {
        Self {
            api_key: api_key.into(),
            model: llm.model.clone(),
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            temperature: llm.temperature,
            max_output_tokens: llm.max_output_tokens,
            client: Client::builder()
                .timeout(Duration::from_secs(llm.request_timeout_secs))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn endpoint(&self) -> String {
        let model_name = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!("{}/v1beta/{model_name}:generateContent", self.base_url)
    }

    fn error(&self, message: impl Into<String>, status_code: Option<u16>) -> ProviderError {
        ProviderError {
            provider: "gemini".into(),
            model: self.model.clone(),
            message: message.into(),
            status_code,
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let start = Instant::now();

        let gemini_request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![Part {
                    text: request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature.unwrap_or(self.temperature),
                max_output_tokens: request.max_tokens.unwrap_or(self.max_output_tokens),
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| self.error(format!("Request failed: {}", e), None))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.error(
                format!("API error ({}): {}", status.as_u16(), error_text),
                Some(status.as_u16()),
            ));
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| self.error(format!("Failed to parse response: {}", e), None))?;

        if let Some(err) = result.error {
            return Err(self.error(format!("API error: {}", err.message), None));
        }

        let Some(candidate) = result.candidates.and_then(|c| c.into_iter().next()) else {
            let reason = result
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".into());
            return Err(self.error(format!("No response from Gemini: {}", reason), None));
        };

        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if content.trim().is_empty() {
            let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
            return Err(self.error(
                format!("Empty response from Gemini (finish reason: {})", reason),
                None,
            ));
        }

        let usage = result.usage_metadata.map_or(TokenUsage::default(), |u| TokenUsage {
            input_tokens: u.prompt_token_count.unwrap_or(0),
            output_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        });

        Ok(GenerateResponse {
            provider: "gemini".into(),
            model: self.model.clone(),
            content,
            usage,
            finish_reason: candidate.finish_reason,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/gemini-test:generateContent";

    fn provider_for(server: &MockServer) -> GeminiProvider {
        let llm = LlmConfig {
            model: "gemini-test".into(),
            base_url: format!("{}/", server.uri()),
            request_timeout_secs: 5,
            ..LlmConfig::default()
        };
        GeminiProvider::new("test-key", &llm)
    }

    #[test]
    fn endpoint_prefixes_models() {
        let llm = LlmConfig {
            model: "gemini-1.5-flash".into(),
            base_url: "https://example.test/".into(),
            ..LlmConfig::default()
        };
        let provider = GeminiProvider::new("k", &llm);
        assert_eq!(
            provider.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );

        let llm = LlmConfig {
            model: "models/gemini-1.5-pro".into(),
            ..llm
        };
        let provider = GeminiProvider::new("k", &llm);
        assert!(provider.endpoint().ends_with("/v1beta/models/gemini-1.5-pro:generateContent"));
    }

    #[test]
    fn provider_name_is_gemini() {
        let provider = GeminiProvider::new("key", &LlmConfig::default());
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.model(), "gemini-1.5-flash-latest");
    }

    #[tokio::test]
    async fn generate_sends_prompt_and_joins_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header(API_KEY_HEADER, "test-key"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "the prompt"}]}],
                "generationConfig": {"maxOutputTokens": 256}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "{\"a\": "}, {"text": "1}"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {
                    "promptTokenCount": 12,
                    "candidatesTokenCount": 4,
                    "totalTokenCount": 16
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = GenerateRequest {
            max_tokens: Some(256),
            ..GenerateRequest::new("the prompt")
        };
        let response = provider.generate(request).await.unwrap();

        assert_eq!(response.content, "{\"a\": 1}");
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(response.usage.total_tokens, 16);
        assert_eq!(response.model, "gemini-test");
    }

    #[tokio::test]
    async fn generate_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerateRequest::new("x"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code, Some(403));
        assert!(err.message.contains("API key not valid"));
        assert!(!err.message.contains("test-key"));
    }

    #[tokio::test]
    async fn generate_reports_blocked_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerateRequest::new("x"))
            .await
            .unwrap_err();

        assert!(err.message.contains("SAFETY"));
        assert_eq!(err.status_code, None);
    }

    #[tokio::test]
    async fn generate_rejects_empty_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "MAX_TOKENS"}]
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerateRequest::new("x"))
            .await
            .unwrap_err();

        assert!(err.message.contains("MAX_TOKENS"));
    }

    #[tokio::test]
    async fn generate_reports_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"message": "quota exhausted"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerateRequest::new("x"))
            .await
            .unwrap_err();

        assert_eq!(err.message, "API error: quota exhausted");
    }
}
