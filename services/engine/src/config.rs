//! services/engine/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Base URL under which `quran.json`, `page-index.json`,
    /// `khamenei-interpretations/{n}.json` and `saan-nuzul.json` are served.
    pub asset_base_url: String,
    pub ai_base_url: String,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
    pub ai_temperature: f32,
    pub ai_streaming: bool,
    pub state_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure
    /// tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let asset_base_url = std::env::var("ASSET_BASE_URL")
            .map_err(|_| ConfigError::MissingVar("ASSET_BASE_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let ai_base_url = std::env::var("AI_API_URL")
            .unwrap_or_else(|_| "https://unified-ai-router-personal.onrender.com".to_string())
            .trim_end_matches('/')
            .to_string();
        let ai_api_key = std::env::var("AI_API_KEY").ok();
        let ai_model = std::env::var("AI_MODEL").unwrap_or_else(|_| "temp".to_string());

        let ai_temperature_str =
            std::env::var("AI_TEMPERATURE").unwrap_or_else(|_| "0.1".to_string());
        let ai_temperature = ai_temperature_str.parse::<f32>().map_err(|e| {
            ConfigError::InvalidValue("AI_TEMPERATURE".to_string(), e.to_string())
        })?;

        let ai_streaming_str = std::env::var("AI_STREAMING").unwrap_or_else(|_| "true".to_string());
        let ai_streaming = ai_streaming_str.parse::<bool>().map_err(|_| {
            ConfigError::InvalidValue(
                "AI_STREAMING".to_string(),
                format!("'{}' is not a boolean", ai_streaming_str),
            )
        })?;

        let state_dir = std::env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./state"));

        let fetch_timeout_str =
            std::env::var("FETCH_TIMEOUT_SECS").unwrap_or_else(|_| "10".to_string());
        let fetch_timeout_secs = fetch_timeout_str.parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue("FETCH_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        let fetch_timeout = Duration::from_secs(fetch_timeout_secs);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            asset_base_url,
            ai_base_url,
            ai_api_key,
            ai_model,
            ai_temperature,
            ai_streaming,
            state_dir,
            fetch_timeout,
            log_level,
        })
    }
}
