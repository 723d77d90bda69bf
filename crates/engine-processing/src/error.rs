use connectors::error::DbError;
use thiserror::Error;

/// A failure that ends the migration of a single table. The message text is
/// what ends up in the table's result, so it leads with the failed step.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to create target database: {0}")]
    EnsureDatabase(#[source] DbError),

    #[error("Failed to get source table schema: {0}")]
    SourceSchema(#[source] DbError),

    #[error("Failed to get source table schema: table {0} not found")]
    SourceTableMissing(String),

    #[error("Failed to get target table schema: {0}")]
    TargetSchema(#[source] DbError),

    #[error("target table missing and createSchema disabled")]
    TargetTableMissing,

    #[error("Failed to drop target table: {0}")]
    DropTable(#[source] DbError),

    #[error("Failed to create target table: {0}")]
    CreateTable(#[source] DbError),

    #[error("Failed to get row count: {0}")]
    RowCount(#[source] DbError),

    #[error("Failed to read rows at offset {offset}: {source}")]
    ReadRows {
        offset: u64,
        #[source]
        source: DbError,
    },

    #[error("Failed to write {rows} rows: {source}")]
    WriteRows {
        rows: usize,
        #[source]
        source: DbError,
    },

    #[error("Migration cancelled")]
    Cancelled,
}
