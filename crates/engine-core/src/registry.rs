use crate::error::RegistryError;
use chrono::Utc;
use model::{
    core::identifiers::TaskId,
    migration::task::{MigrationTask, TaskStatus},
};
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct TaskEntry {
    task: MigrationTask,
    /// Fired by `cancel`; the execution unit polls it between tables and batches.
    cancel: CancellationToken,
    /// Fired once no execution unit is (or will be) working on the task.
    exited: CancellationToken,
}

/// In-memory index of tasks and the only place their lifecycle transitions
/// are decided.
///
/// The lock guards map access only and is never held across an await.
/// A poisoned lock is recovered rather than propagated, so a panic in one
/// task cannot wedge the others.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, TaskEntry>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, TaskEntry>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a task unless one with the same id is already tracked.
    pub fn register(&self, task: MigrationTask) {
        let mut tasks = self.write();
        tasks.entry(task.id.clone()).or_insert_with(|| {
            let exited = CancellationToken::new();
            if task.status.is_terminal() {
                exited.cancel();
            }
            TaskEntry {
                task,
                cancel: CancellationToken::new(),
                exited,
            }
        });
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.read().contains_key(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<MigrationTask> {
        self.read().get(id).map(|e| e.task.clone())
    }

    pub fn list(&self) -> Vec<MigrationTask> {
        let mut tasks: Vec<MigrationTask> = self.read().values().map(|e| e.task.clone()).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// `pending -> running`. Returns the running snapshot and the task's
    /// cancellation token.
    pub fn begin(&self, id: &TaskId) -> Result<(MigrationTask, CancellationToken), RegistryError> {
        let mut tasks = self.write();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::TaskNotFound(id.clone()))?;

        match entry.task.status {
            TaskStatus::Pending => {
                let now = Utc::now();
                entry.task.status = TaskStatus::Running;
                entry.task.started_at = Some(now);
                entry.task.updated_at = now;
                debug!(task_id = %id, "Task transitioned to running");
                Ok((entry.task.clone(), entry.cancel.clone()))
            }
            TaskStatus::Running => Err(RegistryError::TaskRunning(id.clone())),
            TaskStatus::Completed => Err(RegistryError::TaskCompleted(id.clone())),
            from @ (TaskStatus::Failed | TaskStatus::Cancelled) => {
                Err(RegistryError::InvalidTransition {
                    id: id.clone(),
                    from,
                    action: "start",
                })
            }
        }
    }

    /// `pending | running -> cancelled`; fires the task's cancellation token.
    pub fn cancel(&self, id: &TaskId) -> Result<MigrationTask, RegistryError> {
        let mut tasks = self.write();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::TaskNotFound(id.clone()))?;

        let from = entry.task.status;
        if !matches!(from, TaskStatus::Pending | TaskStatus::Running) {
            return Err(RegistryError::InvalidTransition {
                id: id.clone(),
                from,
                action: "cancel",
            });
        }

        let now = Utc::now();
        entry.task.status = TaskStatus::Cancelled;
        entry.task.finished_at = Some(now);
        entry.task.updated_at = now;
        entry.task.current_table = None;
        entry.cancel.cancel();
        if from == TaskStatus::Pending {
            entry.exited.cancel();
        }
        Ok(entry.task.clone())
    }

    /// Applies `f` only while the task is running, so a cancelled or finished
    /// task is never overwritten by late progress.
    pub fn update<F>(&self, id: &TaskId, f: F) -> Option<MigrationTask>
    where
        F: FnOnce(&mut MigrationTask),
    {
        let mut tasks = self.write();
        let entry = tasks.get_mut(id)?;
        if entry.task.status != TaskStatus::Running {
            return None;
        }
        f(&mut entry.task);
        entry.task.updated_at = Utc::now();
        Some(entry.task.clone())
    }

    /// `running -> completed | failed`. A no-op for any other state.
    pub fn finish(&self, id: &TaskId, error: Option<String>) -> Option<MigrationTask> {
        self.update(id, |task| {
            let now = Utc::now();
            task.finished_at = Some(now);
            task.current_table = None;
            match error {
                None => {
                    task.status = TaskStatus::Completed;
                    task.progress = 100.0;
                }
                Some(message) => {
                    task.status = TaskStatus::Failed;
                    task.error_message = Some(message);
                }
            }
        })
    }

    /// Signals that the execution unit for `id` has returned.
    pub fn mark_exited(&self, id: &TaskId) {
        if let Some(entry) = self.read().get(id) {
            entry.exited.cancel();
        }
    }

    /// Token fired when no execution unit is working on the task any more.
    pub fn exited(&self, id: &TaskId) -> Option<CancellationToken> {
        self.read().get(id).map(|e| e.exited.clone())
    }

    /// Drops a finished task whose execution unit has exited. Afterwards the
    /// persisted record is the only copy. Returns whether the entry was removed.
    pub fn evict(&self, id: &TaskId) -> bool {
        let mut tasks = self.write();
        let retired = tasks
            .get(id)
            .is_some_and(|e| e.task.status.is_terminal() && e.exited.is_cancelled());
        if retired {
            tasks.remove(id);
            debug!(task_id = %id, "Evicted finished task from registry");
        }
        retired
    }
}
