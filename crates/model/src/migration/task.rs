use crate::{
    core::identifiers::{QualifiedTable, TaskId},
    datasource::config::DataSourceConfig,
    migration::progress::TableMigrationResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing request to create a migration task.
///
/// `database` accepts a comma-separated list; database prefixes of the
/// `db.table` entries in `tables` are merged into the task's database set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationRequest {
    #[serde(default)]
    pub source_config: DataSourceConfig,
    #[serde(default)]
    pub target_config: DataSourceConfig,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub batch_size: i64,
    #[serde(default)]
    pub create_schema: bool,
    #[serde(default)]
    pub truncate_target: bool,
    #[serde(default)]
    pub only_sync_schema: bool,
}

impl MigrationRequest {
    /// Declared databases followed by table prefixes, de-duplicated in
    /// first-seen order.
    pub fn database_names(&self) -> Vec<String> {
        let declared = self
            .database
            .split(',')
            .map(str::trim)
            .filter(|db| !db.is_empty())
            .map(str::to_string);
        let from_tables = self
            .tables
            .iter()
            .filter_map(|t| QualifiedTable::parse(t).ok())
            .map(|t| t.database);

        let mut names: Vec<String> = Vec::new();
        for db in declared.chain(from_tables) {
            if !names.contains(&db) {
                names.push(db);
            }
        }
        names
    }

    pub fn options(&self) -> MigrationOptions {
        MigrationOptions {
            batch_size: MigrationOptions::normalize_batch_size(self.batch_size),
            create_schema: self.create_schema,
            truncate_target: self.truncate_target,
            only_sync_schema: self.only_sync_schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    pub batch_size: usize,
    pub create_schema: bool,
    pub truncate_target: bool,
    pub only_sync_schema: bool,
}

impl MigrationOptions {
    pub fn normalize_batch_size(raw: i64) -> usize {
        if raw <= 0 {
            DEFAULT_BATCH_SIZE
        } else {
            usize::try_from(raw).unwrap_or(DEFAULT_BATCH_SIZE)
        }
    }
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            create_schema: false,
            truncate_target: false,
            only_sync_schema: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationTask {
    pub id: TaskId,
    pub source: DataSourceConfig,
    pub target: DataSourceConfig,
    pub databases: Vec<String>,
    /// Explicit `db.table` list; empty means every table of the first database.
    pub tables: Vec<String>,
    pub options: MigrationOptions,
    pub status: TaskStatus,
    pub progress: f64,
    pub total_rows: u64,
    pub migrated_rows: u64,
    pub failed_rows: u64,
    pub current_table: Option<String>,
    pub error_message: Option<String>,
    pub table_results: Vec<TableMigrationResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MigrationTask {
    pub fn new(id: TaskId, request: &MigrationRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            source: request.source_config.clone(),
            target: request.target_config.clone(),
            databases: request.database_names(),
            tables: request.tables.clone(),
            options: request.options(),
            status: TaskStatus::Pending,
            progress: 0.0,
            total_rows: 0,
            migrated_rows: 0,
            failed_rows: 0,
            current_table: None,
            error_message: None,
            table_results: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn primary_database(&self) -> Option<&str> {
        self.databases.first().map(String::as_str)
    }
}
