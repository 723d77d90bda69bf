use crate::error::CliError;
use chrono::{DateTime, SecondsFormat, Utc};
use model::migration::{
    compare::CompareReport,
    progress::MigrationProgress,
    task::{MigrationTask, TaskStatus},
};
use serde::Serialize;

/// Listing view of a task. Connection configs stay out of it so passwords
/// are never printed.
#[derive(Debug, Serialize)]
pub struct TaskListing {
    pub id: String,
    pub status: TaskStatus,
    pub databases: Vec<String>,
    pub tables: Vec<String>,
    pub progress: f64,
    pub migrated_rows: u64,
    pub failed_rows: u64,
    pub created_at: String,
    pub error_message: Option<String>,
}

impl From<&MigrationTask> for TaskListing {
    fn from(task: &MigrationTask) -> Self {
        Self {
            id: task.id.to_string(),
            status: task.status,
            databases: task.databases.clone(),
            tables: task.tables.clone(),
            progress: task.progress,
            migrated_rows: task.migrated_rows,
            failed_rows: task.failed_rows,
            created_at: format_ts(&task.created_at),
            error_message: task.error_message.clone(),
        }
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(CliError::JsonSerialize)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", to_json(value)?);
    Ok(())
}

pub async fn write_json<T: Serialize>(value: &T, path: &str) -> Result<(), CliError> {
    tokio::fs::write(path, to_json(value)?).await?;
    Ok(())
}

pub fn print_tasks(tasks: &[MigrationTask]) {
    if tasks.is_empty() {
        println!("No tasks");
        return;
    }
    println!(
        "{:<38} {:<10} {:>7} {:>12} {:<25} {}",
        "ID", "STATUS", "PCT", "MIGRATED", "CREATED", "DATABASES"
    );
    for task in tasks {
        println!(
            "{:<38} {:<10} {:>6.1}% {:>12} {:<25} {}",
            task.id.as_str(),
            task.status.as_str(),
            task.progress,
            task.migrated_rows,
            format_ts(&task.created_at),
            task.databases.join(",")
        );
    }
}

pub fn print_progress(p: &MigrationProgress) {
    println!("Progress for task '{}':", p.task_id);
    println!("-----------------------------");
    println!("{:<16} {}", "Status", p.status);
    println!("{:<16} {:.1}%", "Progress", p.progress);
    println!(
        "{:<16} {} / {} ({} failed)",
        "Rows", p.migrated_rows, p.total_rows, p.failed_rows
    );
    println!(
        "{:<16} {}",
        "Current table",
        p.current_table.as_deref().unwrap_or("n/a")
    );
    let started = p
        .started_at
        .as_ref()
        .map(format_ts)
        .unwrap_or_else(|| "n/a".to_string());
    println!("{:<16} {}", "Started", started);
    let finished = p
        .finished_at
        .as_ref()
        .map(format_ts)
        .unwrap_or_else(|| "n/a".to_string());
    println!("{:<16} {}", "Finished", finished);
    if let Some(secs) = p.summary.duration_secs {
        println!("{:<16} {:.2}s", "Duration", secs);
    }
    if let Some(msg) = &p.error_message {
        println!("{:<16} {}", "Error", msg);
    }

    if !p.tables.is_empty() {
        println!();
        println!(
            "Tables: {} total, {} succeeded, {} failed",
            p.summary.tables_total, p.summary.tables_succeeded, p.summary.tables_failed
        );
        for t in &p.tables {
            let outcome = if t.success { "ok" } else { "FAILED" };
            println!(
                "  {:<40} {:<6} {:>10} rows {:>8} failed  {}",
                t.qualified_name(),
                outcome,
                t.migrated_rows,
                t.failed_rows,
                t.error_message.as_deref().unwrap_or("")
            );
        }
    }
}

/// One line per poll while a task runs.
pub fn progress_line(p: &MigrationProgress) -> String {
    format!(
        "[{}] {:>5.1}% {}/{} rows{}",
        p.status,
        p.progress,
        p.migrated_rows,
        p.total_rows,
        p.current_table
            .as_deref()
            .map(|t| format!(" ({t})"))
            .unwrap_or_default()
    )
}

pub fn print_compare(report: &CompareReport) {
    println!(
        "Table count: source {} / target {} ({})",
        report.table_count_source,
        report.table_count_target,
        if report.table_count_equal {
            "equal"
        } else {
            "different"
        }
    );
    println!(
        "{:<32} {:>7} {:>7} {:>12} {:>12} {}",
        "TABLE", "SOURCE", "TARGET", "SRC ROWS", "TGT ROWS", "MATCH"
    );
    for t in &report.tables {
        let count = |c: Option<u64>| c.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:<32} {:>7} {:>7} {:>12} {:>12} {}",
            t.table,
            yes_no(t.exists_in_source),
            yes_no(t.exists_in_target),
            count(t.row_count_source),
            count(t.row_count_target),
            yes_no(t.counts_match())
        );
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::identifiers::TaskId,
        migration::task::MigrationRequest,
    };

    fn task() -> MigrationTask {
        let mut request = MigrationRequest {
            database: "shop".into(),
            ..Default::default()
        };
        request.source_config.password = "hunter2".into();
        request.target_config.password = "hunter3".into();
        MigrationTask::new(TaskId::new("t-1"), &request, Utc::now())
    }

    #[test]
    fn listing_never_carries_passwords() {
        let json = to_json(&TaskListing::from(&task())).unwrap();
        assert!(json.contains("\"t-1\""));
        assert!(json.contains("\"pending\""));
        assert!(!json.contains("hunter"));
    }

    #[test]
    fn progress_line_shows_current_table() {
        let mut t = task();
        t.status = TaskStatus::Running;
        t.total_rows = 10;
        t.migrated_rows = 4;
        t.progress = 50.0;
        t.current_table = Some("shop.orders".into());
        let p = MigrationProgress::from(&t);
        assert_eq!(progress_line(&p), "[running]  50.0% 4/10 rows (shop.orders)");
    }
}
