use crate::{
    core::identifiers::TaskId,
    migration::task::{MigrationTask, TaskStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of migrating a single table. `success` holds only when no rows
/// failed and no step aborted the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMigrationResult {
    pub database: String,
    pub table: String,
    pub success: bool,
    pub total_rows: u64,
    pub migrated_rows: u64,
    pub failed_rows: u64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TableMigrationResult {
    pub fn begin(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            success: false,
            total_rows: 0,
            migrated_rows: 0,
            failed_rows: 0,
            error_message: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn finished(mut self) -> Self {
        self.success = self.failed_rows == 0 && self.error_message.is_none();
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub tables_total: usize,
    pub tables_succeeded: usize,
    pub tables_failed: usize,
    pub duration_secs: Option<f64>,
}

impl MigrationSummary {
    pub fn from_task(task: &MigrationTask) -> Self {
        let tables_succeeded = task.table_results.iter().filter(|r| r.success).count();
        let duration_secs = match (task.started_at, task.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };
        Self {
            tables_total: task.table_results.len(),
            tables_succeeded,
            tables_failed: task.table_results.len() - tables_succeeded,
            duration_secs,
        }
    }
}

/// Queryable snapshot of a task's runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: f64,
    pub total_rows: u64,
    pub migrated_rows: u64,
    pub failed_rows: u64,
    pub current_table: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub tables: Vec<TableMigrationResult>,
    pub summary: MigrationSummary,
}

impl From<&MigrationTask> for MigrationProgress {
    fn from(task: &MigrationTask) -> Self {
        Self {
            task_id: task.id.clone(),
            status: task.status,
            progress: task.progress,
            total_rows: task.total_rows,
            migrated_rows: task.migrated_rows,
            failed_rows: task.failed_rows,
            current_table: task.current_table.clone(),
            started_at: task.started_at,
            finished_at: task.finished_at,
            error_message: task.error_message.clone(),
            tables: task.table_results.clone(),
            summary: MigrationSummary::from_task(task),
        }
    }
}
