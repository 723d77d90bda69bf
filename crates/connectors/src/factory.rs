use crate::{datasource::DataSource, error::AdapterError, sql::mysql::adapter::MySqlDataSource};
use model::datasource::config::DataSourceType;
use std::{collections::HashMap, sync::Arc};

pub type DataSourceCtor = Arc<dyn Fn() -> Arc<dyn DataSource> + Send + Sync>;

/// Maps a type tag to a constructor. Construction never touches the network;
/// unsupported tags fail here, before any connection attempt.
#[derive(Clone, Default)]
pub struct DataSourceFactory {
    ctors: HashMap<DataSourceType, DataSourceCtor>,
}

impl DataSourceFactory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Factory with every built-in data source registered.
    pub fn with_defaults() -> Self {
        let mut factory = Self::empty();
        factory.register(DataSourceType::MySql, || {
            Arc::new(MySqlDataSource::new()) as Arc<dyn DataSource>
        });
        factory
    }

    /// Adds or replaces the constructor for `kind`.
    pub fn register<F>(&mut self, kind: DataSourceType, ctor: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn DataSource> + Send + Sync + 'static,
    {
        self.ctors.insert(kind, Arc::new(ctor));
        self
    }

    pub fn supports(&self, kind: &DataSourceType) -> bool {
        self.ctors.contains_key(kind)
    }

    pub fn create(&self, kind: Option<&DataSourceType>) -> Result<Arc<dyn DataSource>, AdapterError> {
        let kind = kind.ok_or(AdapterError::MissingType)?;
        match self.ctors.get(kind) {
            Some(ctor) => Ok(ctor()),
            None => Err(AdapterError::UnsupportedDataSource(kind.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysql_is_registered_by_default() {
        let factory = DataSourceFactory::with_defaults();
        let ds = factory.create(Some(&DataSourceType::MySql)).unwrap();
        assert_eq!(ds.kind(), DataSourceType::MySql);
    }

    #[test]
    fn unimplemented_kinds_are_rejected() {
        let factory = DataSourceFactory::with_defaults();
        for kind in [
            DataSourceType::PostgreSql,
            DataSourceType::MongoDb,
            DataSourceType::MinIo,
            DataSourceType::Other("oracle".into()),
        ] {
            match factory.create(Some(&kind)) {
                Err(AdapterError::UnsupportedDataSource(tag)) => assert_eq!(tag, kind.as_str()),
                _ => panic!("expected unsupported error for {kind}"),
            }
        }
        assert!(matches!(factory.create(None), Err(AdapterError::MissingType)));
    }
}
