//! Route definitions for the meter server.
//!
//! Provides the analysis endpoint, a health check, and static asset serving.

use crate::analysis::{AnalysisError, Analyzer};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use meter_common::logging::{trace_id_from_headers, TRACE_ID_HEADER};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tower_http::services::ServeDir;

/// Message returned when the model reply cannot be parsed.
pub const INVALID_MODEL_RESPONSE: &str = "Invalid response from AI model";
/// Message returned for any other server-side failure.
pub const INTERNAL_ERROR: &str = "An internal server error occurred.";
/// Message returned when `text` is missing or blank.
pub const NO_TEXT_PROVIDED: &str = "No text provided";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    /// Echo underlying error text in 500 responses.
    pub expose_error_details: bool,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            expose_error_details: false,
        }
    }

    pub fn with_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }
}

/// Analysis request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Build all routes; unmatched paths fall through to files under `static_dir`.
pub fn build_routes(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/analyze", post(analyze_handler))
        .merge(health_routes())
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// Build health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/health", get(health_handler))
}

// ─────────────────────────────────────────────────────────────────────────────
// Analysis Handler
// ─────────────────────────────────────────────────────────────────────────────

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn with_trace_header(mut response: Response, trace_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// Analyze a block of text.
#[tracing::instrument(name = "analyze", skip_all, fields(trace_id = tracing::field::Empty))]
async fn analyze_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let trace_id = trace_id_from_headers(&headers);
    tracing::Span::current().record("trace_id", trace_id.as_str());

    let text = match payload {
        Ok(Json(request)) => request.text.unwrap_or_default(),
        Err(rejection) => {
            tracing::info!(error = %rejection, "Rejected malformed analyze request");
            let response = error_response(
                StatusCode::BAD_REQUEST,
                "Request body must be JSON with a \"text\" string",
            );
            return with_trace_header(response, &trace_id);
        }
    };

    tracing::info!(
        text_len = text.chars().count(),
        provider = %state.analyzer.provider_label(),
        "Analyze request received"
    );

    let start = Instant::now();
    let response = match state.analyzer.analyze(&text).await {
        Ok(value) => {
            tracing::info!(
                latency_ms = start.elapsed().as_millis() as u64,
                "Analysis complete"
            );
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(AnalysisError::EmptyText) => error_response(StatusCode::BAD_REQUEST, NO_TEXT_PROVIDED),
        Err(e @ AnalysisError::InvalidResponse(_)) => {
            tracing::error!(error = %e, "Could not parse JSON from model response");
            let message = if state.expose_error_details {
                e.to_string()
            } else {
                INVALID_MODEL_RESPONSE.to_string()
            };
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
        Err(e @ AnalysisError::Provider(_)) => {
            tracing::error!(error = %e, "Analysis failed");
            let message = if state.expose_error_details {
                e.to_string()
            } else {
                INTERNAL_ERROR.to_string()
            };
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    };

    with_trace_header(response, &trace_id)
}

// ─────────────────────────────────────────────────────────────────────────────
// Health Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Health check handler.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: "meter-server".into(),
    })
}
