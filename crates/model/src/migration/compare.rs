use serde::{Deserialize, Serialize};

/// Per-table existence and row counts on both sides. Counts are `None` when
/// the table is absent or counting failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableComparison {
    pub table: String,
    pub exists_in_source: bool,
    pub exists_in_target: bool,
    pub row_count_source: Option<u64>,
    pub row_count_target: Option<u64>,
}

impl TableComparison {
    pub fn counts_match(&self) -> bool {
        self.exists_in_source
            && self.exists_in_target
            && self.row_count_source.is_some()
            && self.row_count_source == self.row_count_target
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareReport {
    pub table_count_equal: bool,
    pub table_count_source: usize,
    pub table_count_target: usize,
    pub tables: Vec<TableComparison>,
}
