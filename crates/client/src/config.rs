//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `EVENTDESK_API_URL` - Base URL of the event API (default: `http://localhost:8000/api`)
//! - `EVENTDESK_STORAGE_DIR` - Directory for durable local state (default: `.eventdesk`)
//! - `EVENTDESK_SEARCH_DEBOUNCE_MS` - Search quiet period, 100-2000 (default: 300)
//! - `EVENTDESK_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `EVENTDESK_INTEREST_SAVE_DELAY_MS` - Delay applied when saving interests (default: 500)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_STORAGE_DIR: &str = ".eventdesk";

const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
const MIN_SEARCH_DEBOUNCE_MS: u64 = 100;
const MAX_SEARCH_DEBOUNCE_MS: u64 = 2000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INTEREST_SAVE_DELAY_MS: u64 = 500;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Event client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every API path is appended to
    pub api_url: Url,
    /// Directory holding the file-backed local storage
    pub storage_dir: PathBuf,
    /// Quiet period before a typed search term is sent
    pub search_debounce: Duration,
    /// Timeout for a single HTTP request
    pub request_timeout: Duration,
    /// Simulated latency of saving interest preferences
    pub interest_save_delay: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
    /// Configuration for `api_url` with every other setting at its default.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            interest_save_delay: Duration::from_millis(DEFAULT_INTEREST_SAVE_DELAY_MS),
            sentry_dsn: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable is set to a value
    /// that does not parse or is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_env_or_default("EVENTDESK_API_URL", DEFAULT_API_URL))?;
        let storage_dir = PathBuf::from(get_env_or_default(
            "EVENTDESK_STORAGE_DIR",
            DEFAULT_STORAGE_DIR,
        ));
        let search_debounce = get_optional_env("EVENTDESK_SEARCH_DEBOUNCE_MS")
            .map_or(Ok(Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS)), |raw| {
                parse_search_debounce(&raw)
            })?;
        let request_timeout = get_optional_env("EVENTDESK_REQUEST_TIMEOUT_SECS")
            .map_or(Ok(DEFAULT_REQUEST_TIMEOUT_SECS), |raw| {
                parse_u64("EVENTDESK_REQUEST_TIMEOUT_SECS", &raw)
            })
            .map(Duration::from_secs)?;
        let interest_save_delay = get_optional_env("EVENTDESK_INTEREST_SAVE_DELAY_MS")
            .map_or(Ok(DEFAULT_INTEREST_SAVE_DELAY_MS), |raw| {
                parse_u64("EVENTDESK_INTEREST_SAVE_DELAY_MS", &raw)
            })
            .map(Duration::from_millis)?;
        let sentry_dsn = get_optional_env("SENTRY_DSN").filter(|dsn| !dsn.trim().is_empty());

        Ok(Self {
            api_url,
            storage_dir,
            search_debounce,
            request_timeout,
            interest_save_delay,
            sentry_dsn,
        })
    }

    /// Same configuration pointed at another API.
    #[must_use]
    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = api_url;
        self
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("EVENTDESK_API_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "EVENTDESK_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_search_debounce(raw: &str) -> Result<Duration, ConfigError> {
    let key = "EVENTDESK_SEARCH_DEBOUNCE_MS";
    let ms = parse_u64(key, raw)?;
    if !(MIN_SEARCH_DEBOUNCE_MS..=MAX_SEARCH_DEBOUNCE_MS).contains(&ms) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between {MIN_SEARCH_DEBOUNCE_MS} and {MAX_SEARCH_DEBOUNCE_MS} ms"),
        ));
    }
    Ok(Duration::from_millis(ms))
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
