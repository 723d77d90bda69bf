use crate::{
    error::{ExecutionError, MigrationError},
    execution::{endpoints::close_quietly, executor::MigrationExecutor},
    settings::EngineSettings,
};
use chrono::Utc;
use connectors::{datasource::DataSource, factory::DataSourceFactory};
use engine_core::{
    error::{RegistryError, StateStoreError},
    progress::ProgressReporter,
    registry::TaskRegistry,
    state::{TaskStore, sled_store::SledTaskStore},
};
use model::{
    core::identifiers::{QualifiedTable, TaskId},
    datasource::config::DataSourceConfig,
    migration::{
        compare::{CompareReport, TableComparison},
        progress::MigrationProgress,
        task::{MigrationRequest, MigrationTask, TaskStatus},
    },
};
use std::{any::Any, collections::HashMap, sync::Arc};
use tokio::task::JoinError;
use tracing::{error, info, warn};

pub const RESTART_INTERRUPTED: &str = "interrupted by process restart";

/// Entry point of the engine. Owns the task registry, the persisted mirror
/// and the data source factory; every public operation is safe to call
/// concurrently.
#[derive(Clone)]
pub struct MigrationService {
    factory: DataSourceFactory,
    registry: Arc<TaskRegistry>,
    reporter: ProgressReporter,
    settings: EngineSettings,
}

impl MigrationService {
    /// Opens the sled store under `settings.state_dir`.
    pub async fn open(
        settings: EngineSettings,
        factory: DataSourceFactory,
    ) -> Result<Self, MigrationError> {
        let store = Arc::new(SledTaskStore::open(&settings.state_dir)?);
        Self::with_store(settings, factory, store).await
    }

    /// Builds the service over an existing store. Tasks the store still
    /// records as running belonged to a previous process and are marked
    /// failed.
    pub async fn with_store(
        settings: EngineSettings,
        factory: DataSourceFactory,
        store: Arc<dyn TaskStore>,
    ) -> Result<Self, MigrationError> {
        let registry = Arc::new(TaskRegistry::new());
        let reporter = ProgressReporter::new(registry.clone(), store);
        let service = Self {
            factory,
            registry,
            reporter,
            settings,
        };
        service.reconcile_interrupted().await?;
        Ok(service)
    }

    async fn reconcile_interrupted(&self) -> Result<(), MigrationError> {
        let records = self
            .reporter
            .store()
            .list_tasks()
            .await
            .map_err(|e| MigrationError::InitializationError(e.to_string()))?;

        for record in records
            .into_iter()
            .filter(|r| r.status == TaskStatus::Running)
        {
            let id = record.task_id.clone();
            let mut task = match record.into_task() {
                Ok(task) => task,
                Err(e) => {
                    warn!(task_id = %id, error = %e, "Skipping unreadable task record");
                    continue;
                }
            };
            let now = Utc::now();
            task.status = TaskStatus::Failed;
            task.error_message = Some(RESTART_INTERRUPTED.to_string());
            task.current_table = None;
            task.finished_at = Some(now);
            task.updated_at = now;
            self.reporter.persist(&task).await?;
            warn!(task_id = %id, "Marked task failed: {}", RESTART_INTERRUPTED);
        }
        Ok(())
    }

    pub async fn create_task(&self, request: MigrationRequest) -> Result<TaskId, MigrationError> {
        if request.source_config.kind.is_none() {
            return Err(MigrationError::InvalidConfig(
                "source data source type is required".into(),
            ));
        }
        if request.target_config.kind.is_none() {
            return Err(MigrationError::InvalidConfig(
                "target data source type is required".into(),
            ));
        }

        let mut task = MigrationTask::new(TaskId::generate(), &request, Utc::now());
        if task.databases.is_empty() {
            return Err(MigrationError::InvalidConfig(
                "at least one database is required".into(),
            ));
        }
        if request.batch_size <= 0 {
            task.options.batch_size = self.settings.default_batch_size;
        }

        self.reporter.persist(&task).await?;
        let id = task.id.clone();
        info!(
            task_id = %id,
            databases = ?task.databases,
            tables = task.tables.len(),
            batch_size = task.options.batch_size,
            "Created migration task"
        );
        self.registry.register(task);
        Ok(id)
    }

    /// Moves a pending task to running and spawns its execution unit. Returns
    /// as soon as the unit is spawned.
    pub async fn start_task(&self, id: &TaskId) -> Result<(), MigrationError> {
        let (task, cancel) = self.transition(id, |r| r.begin(id)).await?;
        self.reporter.flush(id).await;

        let executor = MigrationExecutor::new(
            task,
            self.factory.clone(),
            self.reporter.clone(),
            self.settings.write_retry.clone(),
            cancel,
        );
        let reporter = self.reporter.clone();
        let registry = self.registry.clone();
        let task_id = id.clone();

        tokio::spawn(async move {
            let outcome = tokio::spawn(executor.execute()).await;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(join_err) => Some(ExecutionError::Panicked(join_error_message(join_err))),
            };
            if let Some(e) = failure {
                error!(task_id = %task_id, error = %e, "Migration failed");
                reporter.fail(&task_id, e.to_string()).await;
            }
            registry.mark_exited(&task_id);
            reporter.retire(&task_id).await;
        });

        info!(task_id = %id, "Migration task started");
        Ok(())
    }

    pub async fn cancel_task(&self, id: &TaskId) -> Result<(), MigrationError> {
        self.transition(id, |r| r.cancel(id)).await?;
        // Evicts right away when nothing was running; a running unit retires
        // the task itself once it stops.
        self.reporter.retire(id).await;
        info!(task_id = %id, "Migration task cancelled");
        Ok(())
    }

    pub async fn get_progress(&self, id: &TaskId) -> Result<MigrationProgress, MigrationError> {
        self.reporter
            .snapshot(id)
            .await?
            .ok_or_else(|| RegistryError::TaskNotFound(id.clone()).into())
    }

    /// Every known task, newest first. In-memory state wins over the store.
    pub async fn list_tasks(&self) -> Result<Vec<MigrationTask>, MigrationError> {
        let records = self
            .reporter
            .store()
            .list_tasks()
            .await
            .map_err(|e| StateStoreError::Scan(e.to_string()))?;

        let mut tasks: HashMap<TaskId, MigrationTask> = HashMap::new();
        for record in records {
            let id = record.task_id.clone();
            match record.into_task() {
                Ok(task) => {
                    tasks.insert(task.id.clone(), task);
                }
                Err(e) => warn!(task_id = %id, error = %e, "Skipping unreadable task record"),
            }
        }
        for task in self.registry.list() {
            tasks.insert(task.id.clone(), task);
        }

        let mut tasks: Vec<MigrationTask> = tasks.into_values().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    /// Waits until the execution unit of a started task has returned, then
    /// reports its final state. Returns immediately for tasks never started.
    pub async fn wait(&self, id: &TaskId) -> Result<MigrationProgress, MigrationError> {
        let started = self
            .registry
            .get(id)
            .is_some_and(|t| t.started_at.is_some());
        if started && let Some(exited) = self.registry.exited(id) {
            exited.cancelled().await;
        }
        self.get_progress(id).await
    }

    pub async fn test_connection(&self, config: &DataSourceConfig) -> Result<(), MigrationError> {
        let ds = self.connect_endpoint(config).await?;
        let result = ds.test_connection().await;
        close_quietly(&ds, "connection check").await;
        Ok(result?)
    }

    pub async fn list_databases(
        &self,
        config: &DataSourceConfig,
    ) -> Result<Vec<String>, MigrationError> {
        let ds = self.connect_endpoint(config).await?;
        let result = ds.list_databases().await;
        close_quietly(&ds, "connection check").await;
        Ok(result?)
    }

    pub async fn list_tables(
        &self,
        config: &DataSourceConfig,
        database: &str,
    ) -> Result<Vec<String>, MigrationError> {
        let ds = self.connect_endpoint(config).await?;
        let result = ds.list_tables(database).await;
        close_quietly(&ds, "connection check").await;
        Ok(result?)
    }

    /// Read-only comparison of `database` on both sides. Requested entries
    /// may be bare names or `db.table`; with none, every source table is
    /// compared.
    pub async fn compare(
        &self,
        source: &DataSourceConfig,
        target: &DataSourceConfig,
        database: &str,
        tables: &[String],
    ) -> Result<CompareReport, MigrationError> {
        let src = self.connect_endpoint(source).await?;
        let tgt = match self.connect_endpoint(target).await {
            Ok(tgt) => tgt,
            Err(e) => {
                close_quietly(&src, "source").await;
                return Err(e);
            }
        };

        let result = compare_tables(&src, &tgt, database, tables).await;

        close_quietly(&src, "source").await;
        close_quietly(&tgt, "target").await;
        result
    }

    async fn connect_endpoint(
        &self,
        config: &DataSourceConfig,
    ) -> Result<Arc<dyn DataSource>, MigrationError> {
        let ds = self.factory.create(config.kind.as_ref())?;
        ds.connect(config).await?;
        Ok(ds)
    }

    /// Runs a lifecycle transition on a task that may only be in the store.
    /// A finished task can be retired between the load and the transition,
    /// in which case it is loaded again from its final record.
    async fn transition<T, F>(&self, id: &TaskId, op: F) -> Result<T, MigrationError>
    where
        F: Fn(&TaskRegistry) -> Result<T, RegistryError>,
    {
        self.ensure_loaded(id).await?;
        let result = match op(&self.registry) {
            Err(RegistryError::TaskNotFound(_)) => {
                self.ensure_loaded(id).await?;
                op(&self.registry)
            }
            other => other,
        };
        if result.is_err() {
            // A rejected transition must not pin a reloaded finished task.
            self.reporter.retire(id).await;
        }
        Ok(result?)
    }

    /// Brings a task persisted by an earlier process into the registry.
    async fn ensure_loaded(&self, id: &TaskId) -> Result<(), MigrationError> {
        if self.registry.contains(id) {
            return Ok(());
        }
        match self.reporter.load(id).await? {
            Some(task) => {
                self.registry.register(task);
                Ok(())
            }
            None => Err(RegistryError::TaskNotFound(id.clone()).into()),
        }
    }
}

async fn compare_tables(
    src: &Arc<dyn DataSource>,
    tgt: &Arc<dyn DataSource>,
    database: &str,
    tables: &[String],
) -> Result<CompareReport, MigrationError> {
    let src_tables = src.list_tables(database).await?;
    let tgt_tables = tgt.list_tables(database).await?;

    let requested: Vec<QualifiedTable> = if tables.is_empty() {
        src_tables
            .iter()
            .map(|t| QualifiedTable::new(database, t.as_str()))
            .collect()
    } else {
        tables
            .iter()
            .map(|t| {
                QualifiedTable::parse(t).unwrap_or_else(|_| QualifiedTable::new(database, t.trim()))
            })
            .collect()
    };

    let mut comparisons = Vec::with_capacity(requested.len());
    for t in requested {
        let exists_in_source = if t.database == database {
            src_tables.contains(&t.table)
        } else {
            src.list_tables(&t.database).await?.contains(&t.table)
        };
        let exists_in_target = if t.database == database {
            tgt_tables.contains(&t.table)
        } else {
            tgt.list_tables(&t.database).await?.contains(&t.table)
        };

        let row_count_source = if exists_in_source {
            src.row_count(&t.database, &t.table).await.ok()
        } else {
            None
        };
        let row_count_target = if exists_in_target {
            tgt.row_count(&t.database, &t.table).await.ok()
        } else {
            None
        };

        comparisons.push(TableComparison {
            table: t.table,
            exists_in_source,
            exists_in_target,
            row_count_source,
            row_count_target,
        });
    }

    Ok(CompareReport {
        table_count_equal: src_tables.len() == tgt_tables.len(),
        table_count_source: src_tables.len(),
        table_count_target: tgt_tables.len(),
        tables: comparisons,
    })
}

fn join_error_message(err: JoinError) -> String {
    if err.is_cancelled() {
        return "execution unit was aborted".to_string();
    }
    panic_message(err.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic");
    }

    #[tokio::test]
    async fn join_error_carries_panic_text() {
        let err = tokio::spawn(async { panic!("kaput") }).await.unwrap_err();
        assert_eq!(join_error_message(err), "kaput");
    }
}
