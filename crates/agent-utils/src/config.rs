//! Environment-driven configuration helpers
//!
//! Every service in the workspace reads its settings from process environment,
//! optionally seeded from a `.env` file in the working directory.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required variable is unset or blank
    #[error("{0} environment variable not set")]
    Missing(String),

    /// Variable is set but cannot be parsed
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Load a `.env` file if one exists, returning its path
///
/// Variables already present in the environment are not overwritten.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenv::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded .env file");
            Some(path)
        }
        Err(e) => {
            debug!("No .env file loaded: {e}");
            None
        }
    }
}

/// Read a variable, treating blank values as unset
pub fn env_var(key: &str) -> Option<String> {
    non_blank(std::env::var(key).ok())
}

/// Read a variable or fall back to `default`
pub fn env_or(key: &str, default: &str) -> String {
    env_var(key).unwrap_or_else(|| default.to_string())
}

/// Read a variable that must be present
pub fn require_env(key: &str) -> Result<String, ConfigError> {
    env_var(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Read and parse an optional variable
pub fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(key).map(|raw| parse_value(key, &raw)).transpose()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
