use crate::{error::TableError, writer::BatchWriter};
use connectors::datasource::DataSource;
use model::{
    datasource::{
        options::{ReadOptions, WriteOptions},
        schema::TableSchema,
    },
    migration::{progress::TableMigrationResult, task::MigrationOptions},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Copies one table from source to target: provisions the target database
/// and table, then pages through the source by offset and writes each page
/// as a single batch.
///
/// Rows are read without an `ORDER BY`, so the copy is only consistent when
/// the source is not written to while it runs.
pub struct TableMigrator {
    source: Arc<dyn DataSource>,
    target: Arc<dyn DataSource>,
    writer: BatchWriter,
    options: MigrationOptions,
    cancel: CancellationToken,
}

impl TableMigrator {
    pub fn new(
        source: Arc<dyn DataSource>,
        target: Arc<dyn DataSource>,
        writer: BatchWriter,
        options: MigrationOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            writer,
            options,
            cancel,
        }
    }

    /// Never fails: any error ends up in the returned result instead.
    pub async fn migrate(&self, database: &str, table: &str) -> TableMigrationResult {
        let mut result = TableMigrationResult::begin(database, table);
        info!(database, table, "Migrating table");

        match self.run(database, table, &mut result).await {
            Ok(()) => {
                let result = result.finished();
                info!(
                    database,
                    table,
                    total = result.total_rows,
                    migrated = result.migrated_rows,
                    failed = result.failed_rows,
                    "Table migration finished"
                );
                result
            }
            Err(e) => {
                warn!(database, table, error = %e, "Table migration failed");
                result.failed(e.to_string())
            }
        }
    }

    async fn run(
        &self,
        database: &str,
        table: &str,
        result: &mut TableMigrationResult,
    ) -> Result<(), TableError> {
        self.target
            .create_database_if_not_exists(database)
            .await
            .map_err(TableError::EnsureDatabase)?;

        let schema = self
            .source
            .table_schema(database, table)
            .await
            .map_err(TableError::SourceSchema)?
            .ok_or_else(|| TableError::SourceTableMissing(format!("{database}.{table}")))?;

        self.prepare_target(database, table, &schema).await?;

        if self.options.only_sync_schema {
            info!(database, table, "Schema synchronised, skipping data copy");
            return Ok(());
        }

        let total = self
            .source
            .row_count(database, table)
            .await
            .map_err(TableError::RowCount)?;
        result.total_rows = total;

        self.copy_rows(database, table, total, result).await
    }

    async fn prepare_target(
        &self,
        database: &str,
        table: &str,
        schema: &TableSchema,
    ) -> Result<(), TableError> {
        let exists = self
            .target
            .table_schema(database, table)
            .await
            .map_err(TableError::TargetSchema)?
            .is_some();

        match (exists, self.options.create_schema, self.options.truncate_target) {
            (false, false, _) => Err(TableError::TargetTableMissing),
            (false, true, _) => self.create_target_table(database, table, schema).await,
            (true, _, true) => {
                info!(database, table, "Truncating target table by drop and recreate");
                self.target
                    .drop_table(database, table)
                    .await
                    .map_err(TableError::DropTable)?;
                self.create_target_table(database, table, schema).await
            }
            (true, _, false) => Ok(()),
        }
    }

    async fn create_target_table(
        &self,
        database: &str,
        table: &str,
        schema: &TableSchema,
    ) -> Result<(), TableError> {
        if self.can_copy_native_ddl() {
            match self.copy_native_ddl(database, table).await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(
                    database,
                    table,
                    error = %e,
                    "Native DDL copy failed, building table from introspected schema"
                ),
            }
        }

        self.target
            .create_table(database, schema)
            .await
            .map_err(TableError::CreateTable)
    }

    fn can_copy_native_ddl(&self) -> bool {
        self.source.supports_native_ddl_copy()
            && self.target.supports_native_ddl_copy()
            && self.source.kind() == self.target.kind()
    }

    async fn copy_native_ddl(&self, database: &str, table: &str) -> Result<(), TableError> {
        let ddl = self
            .source
            .show_create_table(database, table)
            .await
            .map_err(TableError::CreateTable)?;
        self.target
            .execute_ddl(database, table, &ddl)
            .await
            .map_err(TableError::CreateTable)
    }

    async fn copy_rows(
        &self,
        database: &str,
        table: &str,
        total: u64,
        result: &mut TableMigrationResult,
    ) -> Result<(), TableError> {
        let batch_size = self.options.batch_size.max(1);
        let page = batch_size as u64;
        let write_opts = WriteOptions {
            batch_size,
            truncate: false,
        };

        let mut offset = 0u64;
        while offset < total {
            if self.cancel.is_cancelled() {
                return Err(TableError::Cancelled);
            }

            let rows = self
                .source
                .read_rows(database, table, &ReadOptions::page(offset, page))
                .await
                .map_err(|source| TableError::ReadRows { offset, source })?;
            if rows.is_empty() {
                break;
            }

            let fetched = rows.len() as u64;
            match self.writer.write(database, table, &rows, &write_opts).await {
                Ok(()) => result.migrated_rows += fetched,
                Err(e) => {
                    warn!(database, table, offset, error = %e, "Batch failed, counting rows as failed");
                    result.failed_rows += fetched;
                }
            }

            offset += fetched;
            if fetched < page {
                break;
            }
        }

        Ok(())
    }
}
