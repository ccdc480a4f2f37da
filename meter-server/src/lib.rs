//! Meter Server - HTTP backend for the Offense Meter.
//!
//! A browser posts a block of text; the server wraps it in a fixed
//! instruction prompt, asks a Gemini model for a JSON verdict, recovers the
//! JSON object from the reply, and relays it back.
//!
//! ## Architecture
//!
//! ```text
//! Browser → POST /analyze → prompt → Gemini → fence strip / brace span → JSON
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analysis;
pub mod provider;
pub mod routes;

pub use analysis::{AnalysisError, AnalysisReport, Analyzer};
pub use provider::{
    GeminiProvider, GenerateRequest, GenerateResponse, Provider, ProviderError, TokenUsage,
};
pub use routes::AppState;

use axum::Router;
use meter_common::config::Config;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::build_routes(state, static_dir).layer(cors)
}

/// Wire the Gemini provider and analyzer described by `config`.
pub fn build_state(config: &Config) -> meter_common::Result<AppState> {
    let api_key = config.require_google_api_key()?;
    let provider = GeminiProvider::new(api_key, &config.llm);
    let analyzer = Analyzer::new(Arc::new(provider));

    Ok(AppState::new(analyzer).with_error_details(config.server.expose_error_details))
}

/// Start the server and run until Ctrl-C.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.network.bind.parse::<std::net::IpAddr>()?,
        config.network.port,
    ));

    let state = build_state(config)?;
    let router = build_router(state, &config.server.static_dir);

    tracing::info!(
        model = %config.llm.model,
        static_dir = %config.server.static_dir.display(),
        "Starting meter server on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Meter server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
