#![allow(dead_code)]

use crate::Harness;
use engine_runtime::error::MigrationError;
use model::{
    core::identifiers::TaskId,
    datasource::schema::{ColumnInfo, TableSchema},
    migration::{progress::MigrationProgress, task::MigrationRequest},
    records::row::Row,
};
use std::time::Duration;

/// `id bigint` primary key plus a couple of payload columns.
pub fn orders_schema(name: &str) -> TableSchema {
    TableSchema::new(
        name,
        vec![
            ColumnInfo::new("id", "bigint").primary_key(),
            ColumnInfo::new("customer", "varchar(64)").not_null(),
            ColumnInfo::new("amount", "decimal(10,2)"),
        ],
    )
}

pub fn order_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            Row::new()
                .with("id", i as i64 + 1)
                .with("customer", format!("customer-{}", i % 17))
                .with("amount", (i % 500) as f64 * 1.25)
        })
        .collect()
}

/// Seeds `database.table` on the source with `n` order rows.
pub fn seed_source(h: &Harness, database: &str, table: &str, n: usize) {
    h.source.add_table(database, orders_schema(table), order_rows(n));
}

/// Creates an empty copy of `database.table` on the target.
pub fn seed_target(h: &Harness, database: &str, table: &str) {
    h.target.add_table(database, orders_schema(table), Vec::new());
}

/// Create, start and wait for a task, returning its final progress.
pub async fn run_to_end(h: &Harness, request: MigrationRequest) -> MigrationProgress {
    let id = h.service.create_task(request).await.expect("create task");
    h.service.start_task(&id).await.expect("start task");
    h.service.wait(&id).await.expect("wait for task")
}

/// Polls until `cond` holds, panicking after a few seconds.
pub async fn eventually<F>(what: &str, mut cond: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

pub async fn progress(h: &Harness, id: &TaskId) -> MigrationProgress {
    h.service.get_progress(id).await.expect("get progress")
}

pub fn is_not_found(err: &MigrationError) -> bool {
    matches!(
        err,
        MigrationError::Registry(engine_core::error::RegistryError::TaskNotFound(_))
    )
}
