//! Configuration store error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Configuration file not found: {path}\n\nHint:\n  • Run `dwh create-config` or `dwh build-resources` to create it"
    )]
    NotFound { path: PathBuf },

    #[error("Missing key '{key}' in section [{section}]")]
    MissingKey { section: String, key: String },

    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Interpolation depth exceeded while resolving [{section}] {key}")]
    InterpolationDepth { section: String, key: String },

    #[error("Configuration is missing required keys: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Configuration is locked by {holder} since {since}")]
    Locked { holder: String, since: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn missing_key(section: &str, key: &str) -> Self {
        Self::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub fn invalid_value(section: &str, key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
