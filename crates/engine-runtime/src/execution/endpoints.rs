use crate::error::ExecutionError;
use connectors::{datasource::DataSource, error::AdapterError, factory::DataSourceFactory};
use model::datasource::config::DataSourceConfig;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn connect_source(
    factory: &DataSourceFactory,
    config: &DataSourceConfig,
) -> Result<Arc<dyn DataSource>, ExecutionError> {
    let source = factory
        .create(config.kind.as_ref())
        .map_err(ExecutionError::ConnectSource)?;
    source
        .connect(config)
        .await
        .map_err(|e| ExecutionError::ConnectSource(AdapterError::from(e)))?;
    Ok(source)
}

/// Connects the target, creating its database first when the server reports
/// it unknown. `fallback_database` names the database to create when the
/// target config does not name one.
pub async fn connect_target(
    factory: &DataSourceFactory,
    config: &DataSourceConfig,
    fallback_database: Option<&str>,
) -> Result<Arc<dyn DataSource>, ExecutionError> {
    let target = factory
        .create(config.kind.as_ref())
        .map_err(ExecutionError::ConnectTarget)?;

    match target.connect(config).await {
        Ok(()) => Ok(target),
        Err(e) if e.is_unknown_database() => {
            let database = if config.database.is_empty() {
                fallback_database.unwrap_or_default()
            } else {
                config.database.as_str()
            };
            info!(database, "Target database missing, creating it");
            target
                .create_database_if_not_exists(database)
                .await
                .map_err(ExecutionError::CreateTargetDatabase)?;
            target
                .connect(config)
                .await
                .map_err(ExecutionError::ReconnectTarget)?;
            Ok(target)
        }
        Err(e) => Err(ExecutionError::ConnectTarget(e.into())),
    }
}

pub async fn close_quietly(ds: &Arc<dyn DataSource>, role: &str) {
    if let Err(e) = ds.close().await {
        warn!(role, error = %e, "Failed to close data source");
    }
}
