use model::{core::identifiers::TaskId, migration::task::TaskStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Failed to save task record: {0}")]
    Save(String),

    #[error("Failed to load task record: {0}")]
    Load(String),

    #[error("Failed to scan task records: {0}")]
    Scan(String),

    #[error("Corrupt task record '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

/// Lifecycle violations reported by the task registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task {0} is already running")]
    TaskRunning(TaskId),

    #[error("Task {0} is already completed")]
    TaskCompleted(TaskId),

    #[error("Cannot {action} task {id} in state '{from}'")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        action: &'static str,
    },
}
