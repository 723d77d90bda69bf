use crate::{
    datasource::DataSource,
    error::DbError,
    sql::mysql::{
        ddl::{build_create_table, qualify_create_table},
        params::MySqlParamStore,
        query::{self, qualified, quote_ident},
        row::to_row,
    },
};
use async_trait::async_trait;
use model::{
    datasource::{
        config::{DataSourceConfig, DataSourceType},
        options::{ReadOptions, WriteOptions},
        schema::{ColumnInfo, TableSchema},
    },
    records::row::Row,
};
use mysql_async::{
    Conn, Opts, OptsBuilder, Pool, Row as MySqlRow, SslOpts, TxOpts, prelude::*,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");
const QUERY_COLUMN_NAMES_SQL: &str = include_str!("sql/column_names.sql");
const QUERY_TABLE_COMMENT_SQL: &str = include_str!("sql/table_comment.sql");
const QUERY_TABLE_INDEXES_SQL: &str = include_str!("sql/table_indexes.sql");

type ColumnRow = (String, String, String, Option<String>, String, String);

/// MySQL/MariaDB data source backed by a `mysql_async` pool.
#[derive(Default)]
pub struct MySqlDataSource {
    pool: RwLock<Option<Pool>>,
    config: RwLock<Option<DataSourceConfig>>,
}

impl MySqlDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn opts(config: &DataSourceConfig, database: Option<&str>) -> Opts {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(if config.port == 0 { 3306 } else { config.port })
            .user(Some(config.username.clone()))
            .pass(Some(config.password.clone()))
            .db_name(database.filter(|db| !db.is_empty()).map(str::to_string))
            .init(vec![format!("SET NAMES {}", config.charset())]);

        if matches!(
            config.ssl_mode.to_ascii_lowercase().as_str(),
            "require" | "required" | "verify-ca" | "verify_ca" | "verify-full" | "verify_identity"
        ) {
            builder = builder.ssl_opts(Some(SslOpts::default()));
        }
        builder.into()
    }

    /// Opens a pool and proves it with one checkout, honouring the config's
    /// connect timeout.
    async fn open_pool(config: &DataSourceConfig, database: Option<&str>) -> Result<Pool, DbError> {
        let pool = Pool::new(Self::opts(config, database));
        let checkout = pool.get_conn();
        let conn = match config.connect_timeout() {
            Some(limit) => match tokio::time::timeout(limit, checkout).await {
                Ok(res) => res,
                Err(_) => {
                    let _ = pool.disconnect().await;
                    return Err(DbError::Connection(format!(
                        "connect to {}:{} timed out after {}s",
                        config.host,
                        config.port,
                        limit.as_secs()
                    )));
                }
            },
            None => checkout.await,
        };

        match conn {
            Ok(conn) => {
                drop(conn);
                Ok(pool)
            }
            Err(err) => {
                let _ = pool.disconnect().await;
                let err = DbError::from(err);
                if err.is_unknown_database() {
                    Err(DbError::UnknownDatabase(
                        database.unwrap_or_default().to_string(),
                    ))
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn conn(&self) -> Result<Conn, DbError> {
        let pool = self.pool.read().await.clone().ok_or(DbError::NotConnected)?;
        Ok(pool.get_conn().await?)
    }

    async fn column_names(
        &self,
        conn: &mut Conn,
        database: &str,
        table: &str,
    ) -> Result<Vec<String>, DbError> {
        let columns: Vec<String> = conn
            .exec(QUERY_COLUMN_NAMES_SQL, (database, table))
            .await?;
        if columns.is_empty() {
            return Err(DbError::InvalidSchema(format!(
                "table {} has no columns or does not exist",
                qualified(database, table)
            )));
        }
        Ok(columns)
    }
}

#[async_trait]
impl DataSource for MySqlDataSource {
    fn kind(&self) -> DataSourceType {
        DataSourceType::MySql
    }

    async fn connect(&self, config: &DataSourceConfig) -> Result<(), DbError> {
        *self.config.write().await = Some(config.clone());

        let pool = Self::open_pool(config, Some(&config.database)).await?;
        if let Some(old) = self.pool.write().await.replace(pool) {
            let _ = old.disconnect().await;
        }

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connected to MySQL"
        );
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), DbError> {
        let mut conn = self.conn().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<String>, DbError> {
        let mut conn = self.conn().await?;
        Ok(conn.query("SHOW DATABASES").await?)
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>, DbError> {
        let mut conn = self.conn().await?;
        let sql = format!("SHOW TABLES FROM {}", quote_ident(database));
        Ok(conn.query(sql).await?)
    }

    async fn table_schema(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Option<TableSchema>, DbError> {
        let mut conn = self.conn().await?;
        let rows: Vec<ColumnRow> = conn
            .exec(QUERY_TABLE_COLUMNS_SQL, (database, table))
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let columns = rows
            .into_iter()
            .map(|(name, data_type, nullable, default, comment, key)| ColumnInfo {
                name,
                data_type,
                nullable: nullable.eq_ignore_ascii_case("YES"),
                default,
                comment,
                primary_key: key == "PRI",
            })
            .collect();

        let comment: Option<Option<String>> = conn
            .exec_first(QUERY_TABLE_COMMENT_SQL, (database, table))
            .await?;
        let indexes: Vec<String> = conn
            .exec(QUERY_TABLE_INDEXES_SQL, (database, table))
            .await?;

        Ok(Some(TableSchema {
            name: table.to_string(),
            columns,
            indexes,
            comment: comment.flatten().unwrap_or_default(),
        }))
    }

    async fn read_rows(
        &self,
        database: &str,
        table: &str,
        opts: &ReadOptions,
    ) -> Result<Vec<Row>, DbError> {
        let sql = query::select_page(database, table, opts.filter.as_deref());
        debug!(%sql, offset = opts.offset, limit = opts.limit, "Reading page");

        let mut conn = self.conn().await?;
        let rows: Vec<MySqlRow> = conn.exec(sql, (opts.limit, opts.offset)).await?;
        Ok(rows.iter().map(to_row).collect())
    }

    async fn write_rows(
        &self,
        database: &str,
        table: &str,
        rows: &[Row],
        opts: &WriteOptions,
    ) -> Result<(), DbError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn().await?;
        let target_columns = self.column_names(&mut conn, database, table).await?;

        // Only columns that some row carries; keys unknown to the target are dropped.
        let columns: Vec<String> = target_columns
            .into_iter()
            .filter(|col| rows.iter().any(|row| row.get(col).is_some()))
            .collect();
        if columns.is_empty() {
            return Err(DbError::InvalidSchema(format!(
                "no row column matches target table {}",
                qualified(database, table)
            )));
        }

        // One page may span several INSERTs; they commit together so a retried
        // page never duplicates rows. Dropping `tx` on error rolls back.
        let per_statement = query::rows_per_statement(columns.len(), opts.batch_size);
        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        for chunk in rows.chunks(per_statement) {
            let sql = query::insert_values(database, table, &columns, chunk.len());
            let params = MySqlParamStore::from_rows(chunk, &columns);
            tx.exec_drop(sql, params.into_params()).await?;
        }
        tx.commit().await?;

        debug!(database, table, rows = rows.len(), "Wrote rows");
        Ok(())
    }

    async fn create_table(&self, database: &str, schema: &TableSchema) -> Result<(), DbError> {
        let sql = build_create_table(database, schema)?;
        let mut conn = self.conn().await?;
        conn.query_drop(sql).await?;
        info!(database, table = %schema.name, "Created table from schema");
        Ok(())
    }

    async fn create_database_if_not_exists(&self, database: &str) -> Result<(), DbError> {
        let sql = format!(
            "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET 'utf8mb4' COLLATE 'utf8mb4_general_ci'",
            quote_ident(database)
        );

        if let Ok(mut conn) = self.conn().await {
            conn.query_drop(sql).await?;
            return Ok(());
        }

        // The configured database may be the missing one: go in server-level.
        let config = self.config.read().await.clone().ok_or(DbError::NotConnected)?;
        let pool = Self::open_pool(&config, None).await?;
        let result = async {
            let mut conn = pool.get_conn().await?;
            conn.query_drop(sql).await?;
            Ok::<_, DbError>(())
        }
        .await;
        if let Err(err) = pool.disconnect().await {
            warn!(error = %err, "Failed to close server-level MySQL pool");
        }
        result?;

        info!(database, "Ensured database exists");
        Ok(())
    }

    async fn drop_table(&self, database: &str, table: &str) -> Result<(), DbError> {
        let mut conn = self.conn().await?;
        conn.query_drop(format!("DROP TABLE IF EXISTS {}", qualified(database, table)))
            .await?;
        Ok(())
    }

    async fn row_count(&self, database: &str, table: &str) -> Result<u64, DbError> {
        let mut conn = self.conn().await?;
        let count: Option<u64> = conn.query_first(query::count_rows(database, table)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn close(&self) -> Result<(), DbError> {
        if let Some(pool) = self.pool.write().await.take() {
            pool.disconnect().await?;
            debug!("Closed MySQL pool");
        }
        Ok(())
    }

    fn supports_native_ddl_copy(&self) -> bool {
        true
    }

    async fn show_create_table(&self, database: &str, table: &str) -> Result<String, DbError> {
        let mut conn = self.conn().await?;
        let row: Option<(String, String)> = conn
            .query_first(format!("SHOW CREATE TABLE {}", qualified(database, table)))
            .await?;
        row.map(|(_, ddl)| ddl).ok_or_else(|| {
            DbError::InvalidSchema(format!(
                "no DDL returned for {}",
                qualified(database, table)
            ))
        })
    }

    async fn execute_ddl(&self, database: &str, table: &str, ddl: &str) -> Result<(), DbError> {
        let sql = qualify_create_table(ddl, table, database)?;
        let mut conn = self.conn().await?;
        conn.query_drop(sql).await?;
        info!(database, table, "Created table from native DDL");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operations_before_connect_fail_cleanly() {
        let ds = MySqlDataSource::new();
        assert!(matches!(ds.test_connection().await, Err(DbError::NotConnected)));
        assert!(matches!(
            ds.create_database_if_not_exists("shop").await,
            Err(DbError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent_without_connect() {
        let ds = MySqlDataSource::new();
        ds.close().await.unwrap();
        ds.close().await.unwrap();
    }

    #[test]
    fn advertises_native_ddl_copy() {
        assert!(MySqlDataSource::new().supports_native_ddl_copy());
        assert_eq!(MySqlDataSource::new().kind(), DataSourceType::MySql);
    }
}
