//! Provisioning error types

use dwhflow_config::ConfigError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("API error in {operation}: {message}")]
    Api { operation: String, message: String },

    #[error("Timeout: {what} did not finish within {waited:?}")]
    Timeout { what: String, waited: Duration },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CloudError {
    pub fn api(operation: &str, message: impl std::fmt::Display) -> Self {
        Self::Api {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
