use crate::{error::TableError, retry::classify_db_error};
use connectors::{datasource::DataSource, error::DbError};
use engine_core::retry::RetryPolicy;
use model::{
    datasource::{config::DataSourceConfig, options::WriteOptions},
    records::row::Row,
};
use std::{sync::Arc, time::Instant};
use tracing::{debug, info, warn};

/// Writes pages to the target, reconnecting with the original config between
/// attempts when the failure looks like a lost connection.
pub struct BatchWriter {
    target: Arc<dyn DataSource>,
    target_config: DataSourceConfig,
    retry: RetryPolicy,
}

impl BatchWriter {
    pub fn new(
        target: Arc<dyn DataSource>,
        target_config: DataSourceConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            target,
            target_config,
            retry,
        }
    }

    pub async fn write(
        &self,
        database: &str,
        table: &str,
        rows: &[Row],
        opts: &WriteOptions,
    ) -> Result<(), TableError> {
        if rows.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        self.retry
            .run(
                move |attempt| async move {
                    if attempt > 0 {
                        warn!(database, table, attempt, "Retrying batch write after reconnect");
                        self.reconnect().await?;
                    }
                    self.target.write_rows(database, table, rows, opts).await
                },
                classify_db_error,
            )
            .await
            .map_err(|e| TableError::WriteRows {
                rows: rows.len(),
                source: e.into_inner(),
            })?;

        let duration = start.elapsed();
        info!(
            database,
            table,
            rows = rows.len(),
            duration_ms = duration.as_millis(),
            "Batch written"
        );
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), DbError> {
        if let Err(e) = self.target.close().await {
            debug!(error = %e, "Ignoring error while closing target before reconnect");
        }
        self.target.connect(&self.target_config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model::datasource::{
        config::DataSourceType,
        options::ReadOptions,
        schema::TableSchema,
    };
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    /// Target whose first `failures` writes fail with `error`.
    struct FlakyTarget {
        failures: usize,
        error: fn() -> DbError,
        writes: AtomicUsize,
        connects: AtomicUsize,
    }

    impl FlakyTarget {
        fn new(failures: usize, error: fn() -> DbError) -> Arc<Self> {
            Arc::new(Self {
                failures,
                error,
                writes: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DataSource for FlakyTarget {
        fn kind(&self) -> DataSourceType {
            DataSourceType::Other("flaky".into())
        }
        async fn connect(&self, _: &DataSourceConfig) -> Result<(), DbError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn test_connection(&self) -> Result<(), DbError> {
            Ok(())
        }
        async fn list_databases(&self) -> Result<Vec<String>, DbError> {
            Ok(vec![])
        }
        async fn list_tables(&self, _: &str) -> Result<Vec<String>, DbError> {
            Ok(vec![])
        }
        async fn table_schema(&self, _: &str, _: &str) -> Result<Option<TableSchema>, DbError> {
            Ok(None)
        }
        async fn read_rows(&self, _: &str, _: &str, _: &ReadOptions) -> Result<Vec<Row>, DbError> {
            Ok(vec![])
        }
        async fn write_rows(
            &self,
            _: &str,
            _: &str,
            _: &[Row],
            _: &WriteOptions,
        ) -> Result<(), DbError> {
            let n = self.writes.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
        async fn create_table(&self, _: &str, _: &TableSchema) -> Result<(), DbError> {
            Ok(())
        }
        async fn create_database_if_not_exists(&self, _: &str) -> Result<(), DbError> {
            Ok(())
        }
        async fn drop_table(&self, _: &str, _: &str) -> Result<(), DbError> {
            Ok(())
        }
        async fn row_count(&self, _: &str, _: &str) -> Result<u64, DbError> {
            Ok(0)
        }
        async fn close(&self) -> Result<(), DbError> {
            Ok(())
        }
    }

    fn writer(target: Arc<FlakyTarget>) -> BatchWriter {
        BatchWriter::new(
            target,
            DataSourceConfig::new(DataSourceType::MySql, "dst", 3306),
            RetryPolicy::new(4, Duration::ZERO, Duration::ZERO),
        )
    }

    fn rows() -> Vec<Row> {
        vec![Row::new().with("id", 1i64), Row::new().with("id", 2i64)]
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn reconnects_and_retries_transient_failures() {
        let target = FlakyTarget::new(2, || DbError::Connection("broken pipe".into()));
        writer(target.clone())
            .write("shop", "orders", &rows(), &WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(target.writes.load(Ordering::SeqCst), 3);
        assert_eq!(target.connects.load(Ordering::SeqCst), 2);
        assert!(logs_contain("Retrying batch write after reconnect"));
    }

    #[tokio::test]
    async fn statement_errors_fail_immediately() {
        let target = FlakyTarget::new(1, || DbError::Query("Duplicate entry".into()));
        let err = writer(target.clone())
            .write("shop", "orders", &rows(), &WriteOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TableError::WriteRows { rows: 2, .. }));
        assert_eq!(target.writes.load(Ordering::SeqCst), 1);
        assert_eq!(target.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let target = FlakyTarget::new(usize::MAX, || DbError::Connection("reset".into()));
        let err = writer(target.clone())
            .write("shop", "orders", &rows(), &WriteOptions::default())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Failed to write 2 rows"));
        assert_eq!(target.writes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn empty_page_is_a_no_op() {
        let target = FlakyTarget::new(usize::MAX, || DbError::Connection("reset".into()));
        writer(target.clone())
            .write("shop", "orders", &[], &WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(target.writes.load(Ordering::SeqCst), 0);
    }
}
