//! Meter Server - Main entry point.

use anyhow::Result;
use meter_common::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::load_with_env()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Meter Server v{}", env!("CARGO_PKG_VERSION"));

    meter_server::start_server(&config).await
}
