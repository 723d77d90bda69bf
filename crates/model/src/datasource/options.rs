use serde::{Deserialize, Serialize};

/// Page request for `DataSource::read_rows`. `filter` is a raw predicate
/// passed through to the engine untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadOptions {
    pub offset: u64,
    pub limit: u64,
    pub filter: Option<String>,
}

impl ReadOptions {
    pub fn page(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteOptions {
    pub batch_size: usize,
    pub truncate: bool,
}
