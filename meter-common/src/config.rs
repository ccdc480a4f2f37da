//! Configuration management for the meter service.
//!
//! The service reads an optional configuration file at
//! `~/.offense-meter/config.json` (override with `METER_CONFIG`).
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `METER_BIND_ADDRESS` → network.bind
//! - `METER_PORT` → network.port
//! - `METER_MODEL` → llm.model
//! - `METER_LOG_LEVEL` → observability.log_level
//! - `METER_LOG_FORMAT` → observability.log_format
//! - `METER_STATIC_DIR` → server.static_dir
//! - `GOOGLE_API_KEY` / `GEMINI_API_KEY` → secrets.google_api_key

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".offense-meter"),
        |dirs| dirs.home_dir().join(".offense-meter"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var("METER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address.
    /// Default: "127.0.0.1" (local only)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    5000
}

// ============================================================================
// Secrets Configuration
// ============================================================================

/// API credentials.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// Google Generative Language API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_api_key: Option<String>,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field(
                "google_api_key",
                &self.google_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

// ============================================================================
// LLM Configuration
// ============================================================================

/// Text-generation model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Gemini model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (overridable for testing)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum output tokens
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: i64,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash-latest".into()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}

fn default_temperature() -> f64 {
    0.9
}

fn default_max_output_tokens() -> i64 {
    8192
}

fn default_request_timeout_secs() -> u64 {
    120
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Directory served for `GET /` and other static assets
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Echo the underlying error text in 500 responses instead of the fixed message
    #[serde(default)]
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
            expose_error_details: false,
        }
    }
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets pinned to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides, then validate.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply process environment overrides.
    pub fn apply_env_overrides(&mut self) -> crate::Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// An override that cannot be parsed is a configuration error, never
    /// silently dropped.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> crate::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("METER_BIND_ADDRESS") {
            self.network.bind = bind;
        }
        if let Some(port) = lookup("METER_PORT") {
            self.network.port = port.trim().parse().map_err(|_| {
                crate::Error::Config(format!("METER_PORT is not a valid port: {port}"))
            })?;
        }
        if let Some(model) = lookup("METER_MODEL") {
            self.llm.model = model;
        }
        if let Some(level) = lookup("METER_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("METER_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(dir) = lookup("METER_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup("GOOGLE_API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.secrets.google_api_key = Some(key);
        }
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        if self.network.port == 0 {
            return Err(crate::Error::Config("network.port must be non-zero".into()));
        }
        if self.network.bind.parse::<IpAddr>().is_err() {
            return Err(crate::Error::Config(format!(
                "network.bind is not an IP address: {}",
                self.network.bind
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(crate::Error::Config(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_output_tokens <= 0 {
            return Err(crate::Error::Config(
                "llm.max_output_tokens must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The Google API key, or a configuration error when it is absent.
    pub fn require_google_api_key(&self) -> crate::Result<&str> {
        self.secrets
            .google_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                crate::Error::Config("GOOGLE_API_KEY not found in environment variables.".into())
            })
    }
}
