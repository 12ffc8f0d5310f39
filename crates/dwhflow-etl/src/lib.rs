//! dwhflow ETL
//!
//! Connects to the provisioned cluster using the credentials recorded in the
//! configuration file and runs the fixed statement lists of the song-play
//! schema: table reset, staging load and star-schema inserts.

pub mod error;
pub mod queries;
pub mod runner;

use dwhflow_config::{ConfigStore, DbConnection};

// Re-exports
pub use error::{EtlError, Result, StatementError};
pub use queries::{STAGING_TABLES, SqlCatalog, Statement, TARGET_TABLES};
pub use runner::{EtlRunner, PgExecutor, SqlExecutor};

/// Connect to the cluster recorded in `store` and prepare its catalog
pub async fn connect(store: &ConfigStore) -> Result<EtlRunner<PgExecutor>> {
    let db = DbConnection::from_store(store)?;
    let catalog = SqlCatalog::from_store(store)?;
    let executor = PgExecutor::connect(&db).await?;
    Ok(EtlRunner::new(executor, catalog))
}
