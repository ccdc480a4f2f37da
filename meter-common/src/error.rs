//! Error types for the Offense Meter service.

use thiserror::Error;

/// Result type alias using the meter error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the meter crates.
///
/// Request-time failures live in the server's `AnalysisError`; this type only
/// covers what can stop the process from starting.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
