//! Table schemas discovered from CREATE TABLE statements.
//!
//! Only used as a fallback source of column names when an INSERT omits its
//! explicit column list, and to feed the AUTO_INCREMENT hint to the id
//! resolver.

use crate::parser::statement::CreateTable;
use ahash::AHashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub columns: Vec<String>,
    pub auto_increment_column: Option<String>,
}

/// Per-run catalog of schemas, built incrementally as statements are seen.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    tables: AHashMap<String, TableSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stmt: &CreateTable) {
        self.tables.insert(
            stmt.table.clone(),
            TableSchema {
                columns: stmt.columns.clone(),
                auto_increment_column: stmt.auto_increment_column.clone(),
            },
        );
    }

    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.tables.get(table)
    }
}
