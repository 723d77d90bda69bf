use connectors::error::{AdapterError, DbError};
use engine_core::error::{RegistryError, StateStoreError};
use thiserror::Error;

/// Errors returned synchronously by the migration service.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The request is missing something the engine cannot run without.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// Adapter-related error.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Db error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Lifecycle violation or unknown task.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("State store error: {0}")]
    StateStore(#[from] StateStoreError),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),
}

/// Task-level failures. Their text becomes the task's `error_message`.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to connect source: {0}")]
    ConnectSource(#[source] AdapterError),

    #[error("Failed to connect target: {0}")]
    ConnectTarget(#[source] AdapterError),

    #[error("Failed to create target database: {0}")]
    CreateTargetDatabase(#[source] DbError),

    #[error("Failed to connect target after create db: {0}")]
    ReconnectTarget(#[source] DbError),

    #[error("Source connection test failed: {0}")]
    TestSource(#[source] DbError),

    #[error("Target connection test failed: {0}")]
    TestTarget(#[source] DbError),

    #[error("Failed to list tables: {0}")]
    ListTables(#[source] DbError),

    #[error("No database selected")]
    NoDatabase,

    #[error("Task panicked: {0}")]
    Panicked(String),
}
