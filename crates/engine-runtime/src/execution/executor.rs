use crate::{
    error::ExecutionError,
    execution::endpoints::{close_quietly, connect_source, connect_target},
};
use connectors::{datasource::DataSource, factory::DataSourceFactory};
use engine_core::{progress::ProgressReporter, retry::RetryPolicy};
use engine_processing::{table::TableMigrator, writer::BatchWriter};
use model::{core::identifiers::QualifiedTable, migration::task::MigrationTask};
use std::{sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs one task end to end: connects both sides, resolves the table set and
/// migrates tables one after another. Per-table failures are recorded and
/// never stop the run; an `Err` means the task itself failed.
pub struct MigrationExecutor {
    task: MigrationTask,
    factory: DataSourceFactory,
    reporter: ProgressReporter,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl MigrationExecutor {
    pub fn new(
        task: MigrationTask,
        factory: DataSourceFactory,
        reporter: ProgressReporter,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task,
            factory,
            reporter,
            retry,
            cancel,
        }
    }

    pub async fn execute(self) -> Result<(), ExecutionError> {
        let start = Instant::now();
        info!(task_id = %self.task.id, "Starting migration");

        let source = connect_source(&self.factory, &self.task.source).await?;
        let target = match connect_target(
            &self.factory,
            &self.task.target,
            self.task.primary_database(),
        )
        .await
        {
            Ok(target) => target,
            Err(e) => {
                close_quietly(&source, "source").await;
                return Err(e);
            }
        };

        let outcome = self.run(&source, &target).await;

        close_quietly(&source, "source").await;
        close_quietly(&target, "target").await;

        if outcome.is_ok() {
            info!(
                task_id = %self.task.id,
                duration_secs = %format!("{:.2}", start.elapsed().as_secs_f64()),
                "Migration run finished"
            );
        }
        outcome
    }

    async fn run(
        &self,
        source: &Arc<dyn DataSource>,
        target: &Arc<dyn DataSource>,
    ) -> Result<(), ExecutionError> {
        let id = &self.task.id;

        source
            .test_connection()
            .await
            .map_err(ExecutionError::TestSource)?;
        target
            .test_connection()
            .await
            .map_err(ExecutionError::TestTarget)?;

        let tables = self.resolve_tables(source).await?;
        info!(task_id = %id, tables = tables.len(), "Resolved tables to migrate");

        let mut total = 0u64;
        for t in &tables {
            match source.row_count(&t.database, &t.table).await {
                Ok(n) => total += n,
                Err(e) => warn!(table = %t, error = %e, "Could not count rows, excluding from total"),
            }
        }
        self.reporter.set_total_rows(id, total).await;

        let writer = BatchWriter::new(target.clone(), self.task.target.clone(), self.retry.clone());
        let migrator = TableMigrator::new(
            source.clone(),
            target.clone(),
            writer,
            self.task.options.clone(),
            self.cancel.clone(),
        );

        for (idx, t) in tables.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    task_id = %id,
                    "Cancellation requested before table {}/{}: {}",
                    idx + 1,
                    tables.len(),
                    t
                );
                return Ok(());
            }

            self.reporter
                .table_started(id, idx, tables.len(), &t.to_string())
                .await;
            let result = migrator.migrate(&t.database, &t.table).await;
            self.reporter.table_finished(id, result).await;
        }

        if self.cancel.is_cancelled() {
            info!(task_id = %id, "Migration stopped after cancellation");
            return Ok(());
        }

        self.reporter.complete(id).await;
        Ok(())
    }

    /// Explicit entries win; bare names belong to the first database. With no
    /// explicit entries every table of the first database is migrated.
    async fn resolve_tables(
        &self,
        source: &Arc<dyn DataSource>,
    ) -> Result<Vec<QualifiedTable>, ExecutionError> {
        let primary = self
            .task
            .primary_database()
            .ok_or(ExecutionError::NoDatabase)?;

        if self.task.tables.is_empty() {
            let names = source
                .list_tables(primary)
                .await
                .map_err(ExecutionError::ListTables)?;
            return Ok(names
                .into_iter()
                .map(|t| QualifiedTable::new(primary, t))
                .collect());
        }

        Ok(self
            .task
            .tables
            .iter()
            .map(|entry| {
                QualifiedTable::parse(entry)
                    .unwrap_or_else(|_| QualifiedTable::new(primary, entry.trim()))
            })
            .collect())
    }
}
