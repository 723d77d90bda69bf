use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// A table identifier was not in `database.table` form.
    #[error("Invalid table name format: {0}, must be db.table")]
    InvalidTableName(String),

    /// Config or list text could not be encoded/decoded.
    #[error("Failed to encode or decode JSON text: {0}")]
    Json(#[from] serde_json::Error),
}
