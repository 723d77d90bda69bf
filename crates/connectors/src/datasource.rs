use crate::error::DbError;
use async_trait::async_trait;
use model::{
    datasource::{
        config::{DataSourceConfig, DataSourceType},
        options::{ReadOptions, WriteOptions},
        schema::TableSchema,
    },
    records::row::Row,
};

/// Capability surface every database technology implements.
///
/// Implementations own a single connection pool behind interior mutability,
/// so one instance can be shared across the pipeline as `Arc<dyn DataSource>`.
/// `close` must be safe to call repeatedly and before `connect` ever succeeded.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn kind(&self) -> DataSourceType;

    /// Opens the pool. The config is retained so the caller can reconnect
    /// with exactly the same parameters.
    async fn connect(&self, config: &DataSourceConfig) -> Result<(), DbError>;

    async fn test_connection(&self) -> Result<(), DbError>;

    async fn list_databases(&self) -> Result<Vec<String>, DbError>;

    async fn list_tables(&self, database: &str) -> Result<Vec<String>, DbError>;

    /// `Ok(None)` when the table does not exist.
    async fn table_schema(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Option<TableSchema>, DbError>;

    async fn read_rows(
        &self,
        database: &str,
        table: &str,
        opts: &ReadOptions,
    ) -> Result<Vec<Row>, DbError>;

    /// Writes all rows as batched inserts. A call is all-or-nothing: when it
    /// fails no row of `rows` is left behind, so the page can be retried.
    async fn write_rows(
        &self,
        database: &str,
        table: &str,
        rows: &[Row],
        opts: &WriteOptions,
    ) -> Result<(), DbError>;

    async fn create_table(&self, database: &str, schema: &TableSchema) -> Result<(), DbError>;

    /// Idempotent; may open a temporary server-level connection when the
    /// configured database is the one missing.
    async fn create_database_if_not_exists(&self, database: &str) -> Result<(), DbError>;

    async fn drop_table(&self, database: &str, table: &str) -> Result<(), DbError>;

    async fn row_count(&self, database: &str, table: &str) -> Result<u64, DbError>;

    async fn close(&self) -> Result<(), DbError>;

    /// Whether `show_create_table`/`execute_ddl` are available. DDL is only
    /// copied verbatim between two sources of the same kind that both say yes.
    fn supports_native_ddl_copy(&self) -> bool {
        false
    }

    async fn show_create_table(&self, database: &str, table: &str) -> Result<String, DbError> {
        let _ = (database, table);
        Err(DbError::Unsupported(format!(
            "{} cannot export native DDL",
            self.kind()
        )))
    }

    /// Applies DDL exported by `show_create_table`, re-targeting it at
    /// `database`.
    async fn execute_ddl(&self, database: &str, table: &str, ddl: &str) -> Result<(), DbError> {
        let _ = (database, table, ddl);
        Err(DbError::Unsupported(format!(
            "{} cannot execute native DDL",
            self.kind()
        )))
    }
}
