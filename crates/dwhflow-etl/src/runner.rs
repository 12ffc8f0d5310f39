//! Statement execution against the cluster

use crate::error::{EtlError, Result, StatementError};
use crate::queries::{SqlCatalog, Statement};
use async_trait::async_trait;
use dwhflow_config::DbConnection;
use tokio_postgres::NoTls;
use tracing::{debug, error, info};

/// Executes one SQL statement and commits it
#[async_trait]
pub trait SqlExecutor: Send {
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), StatementError>;
}

/// PostgreSQL-protocol connection to the cluster
pub struct PgExecutor {
    client: tokio_postgres::Client,
}

impl PgExecutor {
    pub async fn connect(db: &DbConnection) -> Result<Self> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&db.host)
            .port(db.port)
            .dbname(&db.name)
            .user(&db.user)
            .password(&db.password);

        info!("Connecting to {}:{}/{}", db.host, db.port, db.name);
        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Database connection error: {}", e);
            }
        });
        Ok(Self { client })
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), StatementError> {
        let transaction = self.client.transaction().await?;
        transaction.batch_execute(sql).await?;
        transaction.commit().await?;
        Ok(())
    }
}

/// Runs the catalog's phases in order, committing after every statement
pub struct EtlRunner<E> {
    executor: E,
    catalog: SqlCatalog,
}

impl<E: SqlExecutor> EtlRunner<E> {
    pub fn new(executor: E, catalog: SqlCatalog) -> Self {
        Self { executor, catalog }
    }

    /// Drop every table, then create them again
    pub async fn reset_tables(&mut self) -> Result<usize> {
        let dropped = run_all(&mut self.executor, &self.catalog.drop).await?;
        let created = run_all(&mut self.executor, &self.catalog.create).await?;
        Ok(dropped + created)
    }

    /// Bulk-load the raw data into the staging tables
    pub async fn load_staging_tables(&mut self) -> Result<usize> {
        run_all(&mut self.executor, &self.catalog.copy).await
    }

    /// Fill the fact and dimension tables from staging
    pub async fn insert_tables(&mut self) -> Result<usize> {
        run_all(&mut self.executor, &self.catalog.insert).await
    }

    pub async fn run_etl(&mut self) -> Result<usize> {
        let loaded = self.load_staging_tables().await?;
        let inserted = self.insert_tables().await?;
        Ok(loaded + inserted)
    }

    pub fn into_executor(self) -> E {
        self.executor
    }
}

async fn run_all<E: SqlExecutor>(executor: &mut E, statements: &[Statement]) -> Result<usize> {
    for statement in statements {
        info!("Executing {}", statement.name);
        debug!("{}", statement.sql);
        executor
            .execute(&statement.sql)
            .await
            .map_err(|source| EtlError::Statement {
                name: statement.name.clone(),
                source,
            })?;
    }
    Ok(statements.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwhflow_config::S3Sources;

    #[derive(Default)]
    struct RecordingExecutor {
        executed: Vec<String>,
        fail_containing: Option<&'static str>,
    }

    #[async_trait]
    impl SqlExecutor for RecordingExecutor {
        async fn execute(&mut self, sql: &str) -> std::result::Result<(), StatementError> {
            if let Some(marker) = self.fail_containing {
                if sql.contains(marker) {
                    return Err("relation does not exist".into());
                }
            }
            self.executed.push(sql.to_string());
            Ok(())
        }
    }

    fn catalog() -> SqlCatalog {
        let sources = S3Sources {
            log_data: "s3://bucket/log_data".to_string(),
            log_jsonpath: "s3://bucket/log_json_path.json".to_string(),
            song_data: "s3://bucket/song_data".to_string(),
        };
        SqlCatalog::new(&sources, "arn:aws:iam::1:role/r", "us-west-2")
    }

    #[tokio::test]
    async fn test_reset_drops_before_creating() {
        let mut runner = EtlRunner::new(RecordingExecutor::default(), catalog());
        assert_eq!(runner.reset_tables().await.unwrap(), 14);

        let executed = runner.into_executor().executed;
        let last_drop = executed.iter().rposition(|s| s.starts_with("DROP")).unwrap();
        let first_create = executed.iter().position(|s| s.starts_with("CREATE")).unwrap();
        assert!(last_drop < first_create);
    }

    #[tokio::test]
    async fn test_run_etl_loads_then_inserts() {
        let mut runner = EtlRunner::new(RecordingExecutor::default(), catalog());
        assert_eq!(runner.run_etl().await.unwrap(), 7);

        let executed = runner.into_executor().executed;
        assert!(executed[0].starts_with("COPY staging_events"));
        assert!(executed[1].starts_with("COPY staging_songs"));
        assert!(executed[2..].iter().all(|s| s.starts_with("INSERT")));
    }

    #[tokio::test]
    async fn test_first_failure_aborts() {
        let executor = RecordingExecutor {
            fail_containing: Some("COPY staging_songs"),
            ..Default::default()
        };
        let mut runner = EtlRunner::new(executor, catalog());

        match runner.run_etl().await {
            Err(EtlError::Statement { name, .. }) => assert_eq!(name, "copy staging_songs"),
            other => panic!("expected statement error, got {:?}", other.map(|_| ())),
        }
        let executed = runner.into_executor().executed;
        assert_eq!(executed.len(), 1);
    }
}
