use thiserror::Error;

const MYSQL_UNKNOWN_DATABASE: u16 = 1049;

/// All errors coming from a data source.
#[derive(Debug, Error)]
pub enum DbError {
    /// MySQL driver error.
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    /// Connection-level failure (timeouts, dropped sockets, broken pipes).
    #[error("Connection error: {0}")]
    Connection(String),

    /// An operation was issued before `connect` succeeded or after `close`.
    #[error("Data source is not connected")]
    NotConnected,

    /// The database named in the connection config does not exist.
    #[error("Unknown database '{0}'")]
    UnknownDatabase(String),

    /// A table definition could not be built or applied.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// The data source does not implement this capability.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Statement-level failure reported by the engine.
    #[error("Query error: {0}")]
    Query(String),
}

impl DbError {
    pub fn is_unknown_database(&self) -> bool {
        match self {
            DbError::UnknownDatabase(_) => true,
            DbError::MySql(mysql_async::Error::Server(server)) => {
                server.code == MYSQL_UNKNOWN_DATABASE
            }
            other => other.to_string().contains("Unknown database"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    /// No data source is registered for the requested type tag.
    #[error("Unsupported data source type: {0}")]
    UnsupportedDataSource(String),

    /// The config carried no type tag at all.
    #[error("Data source type is not specified")]
    MissingType,

    /// Database-related error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_unknown_database_from_message() {
        assert!(DbError::UnknownDatabase("shop".into()).is_unknown_database());
        assert!(DbError::Query("Unknown database 'shop'".into()).is_unknown_database());
        assert!(!DbError::Connection("broken pipe".into()).is_unknown_database());
    }
}
