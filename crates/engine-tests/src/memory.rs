#![allow(dead_code)]

use async_trait::async_trait;
use connectors::{datasource::DataSource, error::DbError};
use model::{
    datasource::{
        config::{DataSourceConfig, DataSourceType},
        options::{ReadOptions, WriteOptions},
        schema::TableSchema,
    },
    records::row::Row,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct MemTable {
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

#[derive(Default)]
struct ServerState {
    databases: BTreeMap<String, BTreeMap<String, MemTable>>,
    unreachable: bool,
    transient_write_failures: usize,
    broken_tables: HashSet<String>,
    panic_on_count: bool,
    read_gate: Option<Arc<Semaphore>>,
    reads: HashMap<String, usize>,
    write_calls: usize,
    connects: usize,
    created_tables: usize,
    dropped_tables: usize,
}

/// A fake database server shared by every `MemoryDataSource` the factory
/// hands out, so tests can seed it and inspect it after a run.
#[derive(Default)]
pub struct MemoryServer {
    state: Mutex<ServerState>,
}

fn key(database: &str, table: &str) -> String {
    format!("{database}.{table}")
}

impl MemoryServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_database(&self, database: &str) {
        self.state()
            .databases
            .entry(database.to_string())
            .or_default();
    }

    pub fn add_table(&self, database: &str, schema: TableSchema, rows: Vec<Row>) {
        self.state()
            .databases
            .entry(database.to_string())
            .or_default()
            .insert(schema.name.clone(), MemTable { schema, rows });
    }

    pub fn has_database(&self, database: &str) -> bool {
        self.state().databases.contains_key(database)
    }

    pub fn table(&self, database: &str, table: &str) -> Option<MemTable> {
        self.state()
            .databases
            .get(database)
            .and_then(|db| db.get(table))
            .cloned()
    }

    pub fn row_count(&self, database: &str, table: &str) -> Option<usize> {
        self.table(database, table).map(|t| t.rows.len())
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// The next `n` writes fail with a dropped-connection error.
    pub fn fail_next_writes(&self, n: usize) {
        self.state().transient_write_failures = n;
    }

    /// Every write into `database.table` fails with a statement error.
    pub fn break_writes(&self, database: &str, table: &str) {
        self.state().broken_tables.insert(key(database, table));
    }

    pub fn panic_on_count(&self, enabled: bool) {
        self.state().panic_on_count = enabled;
    }

    /// Each read takes one permit from `gate` before it returns.
    pub fn gate_reads(&self, gate: Arc<Semaphore>) {
        self.state().read_gate = Some(gate);
    }

    pub fn reads(&self, database: &str, table: &str) -> usize {
        self.state()
            .reads
            .get(&key(database, table))
            .copied()
            .unwrap_or(0)
    }

    pub fn write_calls(&self) -> usize {
        self.state().write_calls
    }

    pub fn connects(&self) -> usize {
        self.state().connects
    }

    pub fn created_tables(&self) -> usize {
        self.state().created_tables
    }

    pub fn dropped_tables(&self) -> usize {
        self.state().dropped_tables
    }
}

/// `DataSource` over a `MemoryServer`. Behaves like a SQL engine where it
/// matters to the pipeline: unknown databases refuse connections, creating
/// an existing table fails, and pages are cut by offset and limit.
pub struct MemoryDataSource {
    kind: DataSourceType,
    server: Arc<MemoryServer>,
    connected: Mutex<bool>,
}

impl MemoryDataSource {
    pub fn new(kind: DataSourceType, server: Arc<MemoryServer>) -> Self {
        Self {
            kind,
            server,
            connected: Mutex::new(false),
        }
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_connected(&self, connected: bool) {
        *self.connected.lock().unwrap_or_else(PoisonError::into_inner) = connected;
    }

    fn ensure_connected(&self) -> Result<(), DbError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DbError::NotConnected)
        }
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    fn kind(&self) -> DataSourceType {
        self.kind.clone()
    }

    async fn connect(&self, config: &DataSourceConfig) -> Result<(), DbError> {
        let mut state = self.server.state();
        state.connects += 1;
        if state.unreachable {
            return Err(DbError::Connection(format!(
                "dial tcp {}:{}: connection refused",
                config.host, config.port
            )));
        }
        if !config.database.is_empty() && !state.databases.contains_key(&config.database) {
            return Err(DbError::UnknownDatabase(config.database.clone()));
        }
        drop(state);
        self.set_connected(true);
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), DbError> {
        self.ensure_connected()
    }

    async fn list_databases(&self) -> Result<Vec<String>, DbError> {
        self.ensure_connected()?;
        Ok(self.server.state().databases.keys().cloned().collect())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>, DbError> {
        self.ensure_connected()?;
        self.server
            .state()
            .databases
            .get(database)
            .map(|db| db.keys().cloned().collect())
            .ok_or_else(|| DbError::UnknownDatabase(database.to_string()))
    }

    async fn table_schema(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Option<TableSchema>, DbError> {
        self.ensure_connected()?;
        Ok(self.server.table(database, table).map(|t| t.schema))
    }

    async fn read_rows(
        &self,
        database: &str,
        table: &str,
        opts: &ReadOptions,
    ) -> Result<Vec<Row>, DbError> {
        self.ensure_connected()?;

        let gate = {
            let mut state = self.server.state();
            *state.reads.entry(key(database, table)).or_default() += 1;
            state.read_gate.clone()
        };
        if let Some(gate) = gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }

        let t = self
            .server
            .table(database, table)
            .ok_or_else(|| DbError::Query(format!("Table '{}' doesn't exist", key(database, table))))?;
        let start = usize::try_from(opts.offset).unwrap_or(usize::MAX).min(t.rows.len());
        let end = start
            .saturating_add(usize::try_from(opts.limit).unwrap_or(usize::MAX))
            .min(t.rows.len());
        Ok(t.rows[start..end].to_vec())
    }

    async fn write_rows(
        &self,
        database: &str,
        table: &str,
        rows: &[Row],
        _opts: &WriteOptions,
    ) -> Result<(), DbError> {
        self.ensure_connected()?;
        let mut state = self.server.state();
        state.write_calls += 1;

        if state.transient_write_failures > 0 {
            state.transient_write_failures -= 1;
            return Err(DbError::Connection("write: broken pipe".into()));
        }
        if state.broken_tables.contains(&key(database, table)) {
            return Err(DbError::Query("Duplicate entry '1' for key 'PRIMARY'".into()));
        }

        let target = state
            .databases
            .get_mut(database)
            .and_then(|db| db.get_mut(table))
            .ok_or_else(|| DbError::Query(format!("Table '{}' doesn't exist", key(database, table))))?;
        target.rows.extend_from_slice(rows);
        Ok(())
    }

    async fn create_table(&self, database: &str, schema: &TableSchema) -> Result<(), DbError> {
        self.ensure_connected()?;
        let mut state = self.server.state();
        let db = state
            .databases
            .get_mut(database)
            .ok_or_else(|| DbError::UnknownDatabase(database.to_string()))?;
        if db.contains_key(&schema.name) {
            return Err(DbError::Query(format!(
                "Table '{}' already exists",
                schema.name
            )));
        }
        db.insert(
            schema.name.clone(),
            MemTable {
                schema: schema.clone(),
                rows: Vec::new(),
            },
        );
        state.created_tables += 1;
        Ok(())
    }

    async fn create_database_if_not_exists(&self, database: &str) -> Result<(), DbError> {
        let mut state = self.server.state();
        if state.unreachable {
            return Err(DbError::Connection("connection refused".into()));
        }
        state.databases.entry(database.to_string()).or_default();
        Ok(())
    }

    async fn drop_table(&self, database: &str, table: &str) -> Result<(), DbError> {
        self.ensure_connected()?;
        let mut state = self.server.state();
        let removed = state
            .databases
            .get_mut(database)
            .and_then(|db| db.remove(table))
            .is_some();
        if removed {
            state.dropped_tables += 1;
        }
        Ok(())
    }

    async fn row_count(&self, database: &str, table: &str) -> Result<u64, DbError> {
        self.ensure_connected()?;
        let panic_on_count = self.server.state().panic_on_count;
        if panic_on_count {
            panic!("injected failure");
        }
        self.server
            .row_count(database, table)
            .map(|n| n as u64)
            .ok_or_else(|| DbError::Query(format!("Table '{}' doesn't exist", key(database, table))))
    }

    async fn close(&self) -> Result<(), DbError> {
        self.set_connected(false);
        Ok(())
    }
}
