//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
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
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub upload_dir: PathBuf,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub pdftotext_path: PathBuf,
    pub extraction_timeout: Duration,
    pub generation_timeout: Duration,
    pub generation_max_retries: u32,
    pub cors_allow_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:8080".parse::<SocketAddr>())?;

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", Ok(5u32))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let upload_dir = lookup("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        // --- Load the Generation Service Settings ---
        // The server cannot answer anything without a key, so its absence is fatal.
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;
        let gemini_model =
            lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash-latest".to_string());
        let gemini_base_url = lookup("GEMINI_BASE_URL")
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());
        let generation_timeout =
            Duration::from_secs(parse_or(&lookup, "GENERATION_TIMEOUT_SECS", Ok(60u64))?);
        let generation_max_retries = parse_or(&lookup, "GENERATION_MAX_RETRIES", Ok(2u32))?;

        // --- Load Extraction Settings ---
        let pdftotext_path = lookup("PDFTOTEXT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("pdftotext"));
        let extraction_timeout =
            Duration::from_secs(parse_or(&lookup, "EXTRACTION_TIMEOUT_SECS", Ok(60u64))?);

        let cors_allow_origin = lookup("CORS_ALLOW_ORIGIN").filter(|v| !v.trim().is_empty());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            upload_dir,
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            pdftotext_path,
            extraction_timeout,
            generation_timeout,
            generation_max_retries,
            cors_allow_origin,
        })
    }
}

/// Parses `key` when present, otherwise falls back to `default`.
fn parse_or<F, T>(
    lookup: &F,
    key: &str,
    default: Result<T, <T as FromStr>::Err>,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let parsed = match lookup(key) {
        Some(raw) => raw.trim().parse::<T>(),
        None => default,
    };
    parsed.map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
