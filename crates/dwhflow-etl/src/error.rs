//! ETL error types

use dwhflow_config::ConfigError;
use thiserror::Error;

/// Error raised by a single SQL statement
pub type StatementError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection failed: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("Statement '{name}' failed: {source}")]
    Statement {
        name: String,
        #[source]
        source: StatementError,
    },
}

pub type Result<T> = std::result::Result<T, EtlError>;
