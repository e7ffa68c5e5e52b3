use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{DEFAULT_ARCHIVE_BASE_URL, DEFAULT_DATABASE_PATH};
use crate::wayback::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Archive endpoints
    pub archive_base_url: String,
    pub known_url_check_base: Option<String>,
    pub http_timeout: Duration,

    // Politeness
    pub catalog_delay: Duration,
    pub download_delay: Duration,

    // Download behaviour
    pub retry: RetryPolicy,
    pub use_apparent_encoding: bool,

    // URL validation
    pub tld_list_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", DEFAULT_DATABASE_PATH)),

            // Archive endpoints
            archive_base_url: env_or_default("ARCHIVE_BASE_URL", DEFAULT_ARCHIVE_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            known_url_check_base: optional_env("KNOWN_URL_CHECK_BASE")
                .map(|s| s.trim_end_matches('/').to_string()),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 60)?),

            // Politeness
            catalog_delay: Duration::from_millis(parse_env_u64("CATALOG_DELAY_MS", 1500)?),
            download_delay: Duration::from_millis(parse_env_u64("DOWNLOAD_DELAY_MS", 1000)?),

            // Download behaviour
            retry: RetryPolicy {
                max_attempts: parse_env_u32("RETRY_MAX_ATTEMPTS", 12)?,
                multiplier: Duration::from_secs(parse_env_u64("RETRY_MULTIPLIER_SECS", 1)?),
                min_wait: Duration::from_secs(parse_env_u64("RETRY_MIN_SECS", 32)?),
                max_wait: Duration::from_secs(parse_env_u64("RETRY_MAX_SECS", 64)?),
            },
            use_apparent_encoding: parse_env_bool("USE_APPARENT_ENCODING", true)?,

            // URL validation
            tld_list_path: optional_env("TLD_LIST_PATH").map(PathBuf::from),
        })
    }

    /// Configuration with no delays and a short retry budget, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from(":memory:"),
            archive_base_url: DEFAULT_ARCHIVE_BASE_URL.to_string(),
            known_url_check_base: None,
            http_timeout: Duration::from_secs(5),
            catalog_delay: Duration::ZERO,
            download_delay: Duration::ZERO,
            retry: RetryPolicy {
                max_attempts: 3,
                multiplier: Duration::ZERO,
                min_wait: Duration::ZERO,
                max_wait: Duration::ZERO,
            },
            use_apparent_encoding: true,
            tld_list_path: None,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "RETRY_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.retry.min_wait > self.retry.max_wait {
            return Err(ConfigError::InvalidValue {
                name: "RETRY_MIN_SECS".to_string(),
                message: "cannot exceed RETRY_MAX_SECS".to_string(),
            });
        }
        if url::Url::parse(&self.archive_base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "ARCHIVE_BASE_URL".to_string(),
                message: format!("not a valid URL: '{}'", self.archive_base_url),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
