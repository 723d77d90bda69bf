use crate::error::StateStoreError;
use chrono::{DateTime, Utc};
use model::{
    core::identifiers::TaskId,
    datasource::config::DataSourceConfig,
    migration::{
        progress::TableMigrationResult,
        task::{MigrationOptions, MigrationTask, TaskStatus},
    },
};
use serde::{Deserialize, Serialize};

/// Persisted form of a task. Endpoint configs and list-valued fields are kept
/// as opaque JSON text so the record layout stays stable as they evolve.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskRecord {
    pub task_id: String,
    pub source_config: String,
    pub target_config: String,
    pub databases: String,
    pub tables: String,
    pub batch_size: u64,
    pub create_schema: bool,
    pub truncate_target: bool,
    pub only_sync_schema: bool,
    pub status: TaskStatus,
    pub progress: f64,
    pub total_rows: u64,
    pub migrated_rows: u64,
    pub failed_rows: u64,
    pub current_table: String,
    pub error_message: String,
    pub table_results: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn from_task(task: &MigrationTask) -> Result<Self, StateStoreError> {
        let encode_err = |e: model::error::ModelError| StateStoreError::Save(e.to_string());
        let json_err = |e: serde_json::Error| StateStoreError::Save(e.to_string());

        Ok(Self {
            task_id: task.id.to_string(),
            source_config: task.source.to_text().map_err(encode_err)?,
            target_config: task.target.to_text().map_err(encode_err)?,
            databases: serde_json::to_string(&task.databases).map_err(json_err)?,
            tables: serde_json::to_string(&task.tables).map_err(json_err)?,
            batch_size: task.options.batch_size as u64,
            create_schema: task.options.create_schema,
            truncate_target: task.options.truncate_target,
            only_sync_schema: task.options.only_sync_schema,
            status: task.status,
            progress: task.progress,
            total_rows: task.total_rows,
            migrated_rows: task.migrated_rows,
            failed_rows: task.failed_rows,
            current_table: task.current_table.clone().unwrap_or_default(),
            error_message: task.error_message.clone().unwrap_or_default(),
            table_results: serde_json::to_string(&task.table_results).map_err(json_err)?,
            created_at: task.created_at,
            updated_at: task.updated_at,
            started_at: task.started_at,
            finished_at: task.finished_at,
        })
    }

    pub fn into_task(self) -> Result<MigrationTask, StateStoreError> {
        let id = self.task_id.clone();
        let corrupt = |reason: String| StateStoreError::Corrupt {
            id: id.clone(),
            reason,
        };

        let source = DataSourceConfig::from_text(&self.source_config)
            .map_err(|e| corrupt(format!("source config: {e}")))?;
        let target = DataSourceConfig::from_text(&self.target_config)
            .map_err(|e| corrupt(format!("target config: {e}")))?;
        let databases: Vec<String> = serde_json::from_str(&self.databases)
            .map_err(|e| corrupt(format!("databases: {e}")))?;
        let tables: Vec<String> =
            serde_json::from_str(&self.tables).map_err(|e| corrupt(format!("tables: {e}")))?;
        let table_results: Vec<TableMigrationResult> = serde_json::from_str(&self.table_results)
            .map_err(|e| corrupt(format!("table results: {e}")))?;

        Ok(MigrationTask {
            id: TaskId::new(self.task_id),
            source,
            target,
            databases,
            tables,
            options: MigrationOptions {
                batch_size: usize::try_from(self.batch_size).unwrap_or(usize::MAX),
                create_schema: self.create_schema,
                truncate_target: self.truncate_target,
                only_sync_schema: self.only_sync_schema,
            },
            status: self.status,
            progress: self.progress,
            total_rows: self.total_rows,
            migrated_rows: self.migrated_rows,
            failed_rows: self.failed_rows,
            current_table: Some(self.current_table).filter(|t| !t.is_empty()),
            error_message: Some(self.error_message).filter(|m| !m.is_empty()),
            table_results,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}
