use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Arc<str>);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A `database.table` pair. Only the first dot separates the two parts,
/// so table names may themselves contain dots.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedTable {
    pub database: String,
    pub table: String,
}

impl QualifiedTable {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    pub fn parse(name: &str) -> Result<Self, ModelError> {
        match name.split_once('.') {
            Some((db, table)) if !db.trim().is_empty() && !table.trim().is_empty() => {
                Ok(Self::new(db.trim(), table.trim()))
            }
            _ => Err(ModelError::InvalidTableName(name.to_string())),
        }
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_dot_only() {
        let t = QualifiedTable::parse("shop.orders.archive").unwrap();
        assert_eq!(t.database, "shop");
        assert_eq!(t.table, "orders.archive");
    }

    #[test]
    fn rejects_unqualified_names() {
        assert!(QualifiedTable::parse("orders").is_err());
        assert!(QualifiedTable::parse(".orders").is_err());
        assert!(QualifiedTable::parse("shop.").is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TaskId::generate(), TaskId::generate());
    }
}
