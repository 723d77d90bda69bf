#![allow(dead_code)]

use crate::memory::{MemoryDataSource, MemoryServer};
use connectors::{datasource::DataSource, factory::DataSourceFactory};
use engine_core::{
    retry::RetryPolicy,
    state::{TaskStore, sled_store::SledTaskStore},
};
use engine_runtime::{service::MigrationService, settings::EngineSettings};
use model::{
    datasource::config::{DataSourceConfig, DataSourceType},
    migration::task::MigrationRequest,
};
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;

pub mod memory;
pub mod mysql;
pub mod utils;

// Type tags the in-memory servers are registered under.
pub const SOURCE_KIND: &str = "memsrc";
pub const TARGET_KIND: &str = "memdst";

/// A migration service wired to two in-memory servers and a private sled
/// directory.
pub struct Harness {
    pub service: MigrationService,
    pub source: Arc<MemoryServer>,
    pub target: Arc<MemoryServer>,
    pub store: Arc<dyn TaskStore>,
    _state_dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let state_dir = tempfile::tempdir().expect("create state dir");
        let store: Arc<dyn TaskStore> =
            Arc::new(SledTaskStore::open(state_dir.path()).expect("open sled"));
        Self::with_store(state_dir, store).await
    }

    /// A second service over the same store, as if the process restarted.
    pub async fn restart(self) -> Self {
        let Harness {
            source,
            target,
            store,
            _state_dir,
            ..
        } = self;
        let service = build_service(&_state_dir, store.clone(), &source, &target).await;
        Self {
            service,
            source,
            target,
            store,
            _state_dir,
        }
    }

    async fn with_store(state_dir: TempDir, store: Arc<dyn TaskStore>) -> Self {
        let source = MemoryServer::new();
        let target = MemoryServer::new();
        let service = build_service(&state_dir, store.clone(), &source, &target).await;
        Self {
            service,
            source,
            target,
            store,
            _state_dir: state_dir,
        }
    }

    pub fn source_config(&self, database: &str) -> DataSourceConfig {
        DataSourceConfig::new(DataSourceType::from(SOURCE_KIND), "source.local", 3306)
            .with_database(database)
            .with_credentials("etl", "secret")
    }

    pub fn target_config(&self, database: &str) -> DataSourceConfig {
        DataSourceConfig::new(DataSourceType::from(TARGET_KIND), "target.local", 3306)
            .with_database(database)
            .with_credentials("etl", "secret")
    }

    /// Request for `database` with the given explicit tables.
    pub fn request(&self, database: &str, tables: &[&str]) -> MigrationRequest {
        MigrationRequest {
            source_config: self.source_config(database),
            target_config: self.target_config(database),
            database: database.to_string(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
            batch_size: 1000,
            ..Default::default()
        }
    }
}

pub fn factory(source: &Arc<MemoryServer>, target: &Arc<MemoryServer>) -> DataSourceFactory {
    let mut factory = DataSourceFactory::empty();
    let src = source.clone();
    factory.register(DataSourceType::from(SOURCE_KIND), move || {
        Arc::new(MemoryDataSource::new(
            DataSourceType::from(SOURCE_KIND),
            src.clone(),
        )) as Arc<dyn DataSource>
    });
    let dst = target.clone();
    factory.register(DataSourceType::from(TARGET_KIND), move || {
        Arc::new(MemoryDataSource::new(
            DataSourceType::from(TARGET_KIND),
            dst.clone(),
        )) as Arc<dyn DataSource>
    });
    factory
}

async fn build_service(
    state_dir: &TempDir,
    store: Arc<dyn TaskStore>,
    source: &Arc<MemoryServer>,
    target: &Arc<MemoryServer>,
) -> MigrationService {
    let settings = EngineSettings::with_state_dir(state_dir.path())
        .write_retry(RetryPolicy::new(4, Duration::ZERO, Duration::ZERO));
    MigrationService::with_store(settings, factory(source, target), store)
        .await
        .expect("build migration service")
}
