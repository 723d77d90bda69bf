use crate::{
    error::StateStoreError,
    registry::TaskRegistry,
    state::{TaskStore, models::TaskRecord},
};
use model::{
    core::identifiers::TaskId,
    migration::{
        progress::{MigrationProgress, TableMigrationResult},
        task::MigrationTask,
    },
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Applies progress to the registry and mirrors every change to the store.
///
/// Writes to the store are serialized and always carry the registry's latest
/// snapshot, so the persisted record never moves backwards.
#[derive(Clone)]
pub struct ProgressReporter {
    registry: Arc<TaskRegistry>,
    store: Arc<dyn TaskStore>,
    write_lock: Arc<Mutex<()>>,
}

impl ProgressReporter {
    pub fn new(registry: Arc<TaskRegistry>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            registry,
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Persists `task` as-is. Used when a task is first created and the
    /// caller needs to know whether the write landed.
    pub async fn persist(&self, task: &MigrationTask) -> Result<(), StateStoreError> {
        let _guard = self.write_lock.lock().await;
        let record = TaskRecord::from_task(task)?;
        self.store
            .save_task(&record)
            .await
            .map_err(|e| StateStoreError::Save(e.to_string()))
    }

    /// Persists the registry's current view of `id`. Failures are logged and
    /// never interrupt the migration.
    pub async fn flush(&self, id: &TaskId) {
        let _guard = self.write_lock.lock().await;
        let Some(task) = self.registry.get(id) else {
            return;
        };
        let result = match TaskRecord::from_task(&task) {
            Ok(record) => self
                .store
                .save_task(&record)
                .await
                .map_err(|e| StateStoreError::Save(e.to_string())),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(task_id = %id, error = %e, "Failed to persist task state");
        }
    }

    pub async fn set_total_rows(&self, id: &TaskId, total: u64) {
        if self.registry.update(id, |t| t.total_rows = total).is_some() {
            self.flush(id).await;
        }
    }

    /// Marks the table at `index` (0-based, of `count`) as in progress.
    pub async fn table_started(&self, id: &TaskId, index: usize, count: usize, table: &str) {
        let progress = step_progress(index, count);
        let updated = self.registry.update(id, |t| {
            t.progress = progress;
            t.current_table = Some(table.to_string());
        });
        if updated.is_some() {
            self.flush(id).await;
        }
    }

    pub async fn table_finished(&self, id: &TaskId, result: TableMigrationResult) {
        let updated = self.registry.update(id, |t| {
            t.migrated_rows += result.migrated_rows;
            t.failed_rows += result.failed_rows;
            t.table_results.push(result);
        });
        if updated.is_some() {
            self.flush(id).await;
        }
    }

    pub async fn complete(&self, id: &TaskId) -> Option<MigrationTask> {
        let task = self.registry.finish(id, None);
        if task.is_some() {
            self.flush(id).await;
        }
        task
    }

    pub async fn fail(&self, id: &TaskId, message: impl Into<String>) -> Option<MigrationTask> {
        let task = self.registry.finish(id, Some(message.into()));
        if task.is_some() {
            self.flush(id).await;
        }
        task
    }

    /// Persists the final state of a finished task and releases its registry
    /// entry. The entry stays in memory when the write fails, so the outcome
    /// is still queryable.
    pub async fn retire(&self, id: &TaskId) {
        let _guard = self.write_lock.lock().await;
        let Some(task) = self.registry.get(id) else {
            return;
        };
        if !task.status.is_terminal() {
            return;
        }
        let saved = match TaskRecord::from_task(&task) {
            Ok(record) => self
                .store
                .save_task(&record)
                .await
                .map_err(|e| StateStoreError::Save(e.to_string())),
            Err(e) => Err(e),
        };
        match saved {
            Ok(()) => {
                self.registry.evict(id);
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "Keeping finished task in memory");
            }
        }
    }

    /// Latest snapshot of a task, from memory first and the store second.
    pub async fn load(&self, id: &TaskId) -> Result<Option<MigrationTask>, StateStoreError> {
        if let Some(task) = self.registry.get(id) {
            return Ok(Some(task));
        }
        let record = self
            .store
            .load_task(id.as_str())
            .await
            .map_err(|e| StateStoreError::Load(e.to_string()))?;
        record.map(TaskRecord::into_task).transpose()
    }

    pub async fn snapshot(&self, id: &TaskId) -> Result<Option<MigrationProgress>, StateStoreError> {
        Ok(self.load(id).await?.as_ref().map(MigrationProgress::from))
    }
}

fn step_progress(index: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    index as f64 / count as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::sled_store::SledTaskStore;
    use chrono::Utc;
    use model::migration::task::{MigrationRequest, TaskStatus};
    use tempfile::{TempDir, tempdir};

    fn reporter() -> (ProgressReporter, TempDir) {
        let dir = tempdir().unwrap();
        let store: Arc<dyn TaskStore> = Arc::new(SledTaskStore::open(dir.path()).unwrap());
        (ProgressReporter::new(Arc::new(TaskRegistry::new()), store), dir)
    }

    async fn running(reporter: &ProgressReporter) -> TaskId {
        let id = TaskId::generate();
        let req = MigrationRequest {
            database: "shop".into(),
            ..Default::default()
        };
        let task = MigrationTask::new(id.clone(), &req, Utc::now());
        reporter.persist(&task).await.unwrap();
        reporter.registry().register(task);
        reporter.registry().begin(&id).unwrap();
        id
    }

    async fn stored(reporter: &ProgressReporter, id: &TaskId) -> MigrationTask {
        reporter
            .store()
            .load_task(id.as_str())
            .await
            .unwrap()
            .unwrap()
            .into_task()
            .unwrap()
    }

    #[tokio::test]
    async fn table_steps_update_progress_and_counters() {
        let (reporter, _dir) = reporter();
        let id = running(&reporter).await;

        reporter.set_total_rows(&id, 300).await;
        reporter.table_started(&id, 1, 4, "orders").await;

        let task = stored(&reporter, &id).await;
        assert_eq!(task.total_rows, 300);
        assert_eq!(task.progress, 25.0);
        assert_eq!(task.current_table.as_deref(), Some("orders"));

        let mut result = TableMigrationResult::begin("shop", "orders");
        result.total_rows = 100;
        result.migrated_rows = 90;
        result.failed_rows = 10;
        reporter.table_finished(&id, result.finished()).await;

        let task = stored(&reporter, &id).await;
        assert_eq!(task.migrated_rows, 90);
        assert_eq!(task.failed_rows, 10);
        assert_eq!(task.table_results.len(), 1);
        assert!(!task.table_results[0].success);
    }

    #[tokio::test]
    async fn completion_is_persisted() {
        let (reporter, _dir) = reporter();
        let id = running(&reporter).await;
        reporter.table_started(&id, 0, 1, "orders").await;

        let done = reporter.complete(&id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        let task = stored(&reporter, &id).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100.0);
        assert!(task.current_table.is_none());
        assert!(task.finished_at.is_some());
    }

    #[tokio::test]
    async fn failure_keeps_message() {
        let (reporter, _dir) = reporter();
        let id = running(&reporter).await;

        reporter.fail(&id, "Failed to list tables: boom").await;

        let progress = reporter.snapshot(&id).await.unwrap().unwrap();
        assert_eq!(progress.status, TaskStatus::Failed);
        assert_eq!(
            progress.error_message.as_deref(),
            Some("Failed to list tables: boom")
        );
    }

    #[tokio::test]
    async fn late_progress_after_cancel_is_ignored() {
        let (reporter, _dir) = reporter();
        let id = running(&reporter).await;
        reporter.registry().cancel(&id).unwrap();
        reporter.flush(&id).await;

        reporter.table_started(&id, 0, 2, "orders").await;
        assert!(reporter.complete(&id).await.is_none());

        let task = stored(&reporter, &id).await;
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.current_table.is_none());
    }

    #[tokio::test]
    async fn load_falls_back_to_store() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn TaskStore> = Arc::new(SledTaskStore::open(dir.path()).unwrap());
        let first = ProgressReporter::new(Arc::new(TaskRegistry::new()), store.clone());
        let id = running(&first).await;
        first.complete(&id).await;

        let fresh = ProgressReporter::new(Arc::new(TaskRegistry::new()), store);
        let task = fresh.load(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(fresh.load(&TaskId::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retired_task_is_served_from_store() {
        let (reporter, _dir) = reporter();
        let id = running(&reporter).await;
        reporter.table_started(&id, 0, 1, "orders").await;

        // Not finished yet: stays in memory.
        reporter.retire(&id).await;
        assert!(reporter.registry().contains(&id));

        reporter.complete(&id).await.unwrap();
        reporter.registry().mark_exited(&id);
        reporter.retire(&id).await;
        assert!(!reporter.registry().contains(&id));

        let progress = reporter.snapshot(&id).await.unwrap().unwrap();
        assert_eq!(progress.status, TaskStatus::Completed);
        assert_eq!(progress.progress, 100.0);
    }

    #[test]
    fn step_progress_is_proportional() {
        assert_eq!(step_progress(0, 4), 0.0);
        assert_eq!(step_progress(3, 4), 75.0);
        assert_eq!(step_progress(0, 0), 0.0);
    }
}
