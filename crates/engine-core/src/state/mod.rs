use crate::state::models::TaskRecord;
use async_trait::async_trait;
use std::error::Error;

pub mod models;
pub mod sled_store;

/// Durable mirror of task state, one record per task id. Records are
/// overwritten in place and never deleted by the engine.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save_task(&self, record: &TaskRecord) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn load_task(
        &self,
        task_id: &str,
    ) -> Result<Option<TaskRecord>, Box<dyn Error + Send + Sync>>;
    /// All records, newest first.
    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, Box<dyn Error + Send + Sync>>;
}
