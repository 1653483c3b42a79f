//! Environment configuration helpers
//!
//! Typed lookups over process environment variables. Parsing is separated
//! from the lookup so it can be exercised without mutating the environment.

use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Read a variable, treating blank values as unset
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Require a raw value to be present
pub fn require(key: &str, raw: Option<String>) -> Result<String, ConfigError> {
    raw.ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Parse an optional raw value, falling back to `default` when absent
pub fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("{raw:?}: {e}"),
        }),
    }
}
