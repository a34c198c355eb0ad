use std::collections::HashMap;
use std::sync::Arc;

use crate::types::DbValue;

/// Column metadata shared by every row of one result.
#[derive(Debug)]
pub struct Columns {
    names: Vec<String>,
    // Internal cache for faster column lookups (to avoid repeated string comparisons)
    index: HashMap<String, usize>,
}

impl Columns {
    #[must_use]
    pub fn new(names: Vec<String>) -> Arc<Self> {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_ascii_lowercase(), i))
            .collect();
        Arc::new(Self { names, index })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Case-insensitive column lookup.
    #[must_use]
    pub fn index_of(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.index.get(column_name) {
            return Some(idx);
        }
        self.index.get(&column_name.to_ascii_lowercase()).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A raw row produced by a driver.
#[derive(Debug, Clone)]
pub struct DbRow {
    /// The column names for this row (shared across all rows in a result)
    pub columns: Arc<Columns>,
    /// The values for this row
    pub values: Vec<DbValue>,
}

impl DbRow {
    #[must_use]
    pub fn new(columns: Arc<Columns>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&DbValue> {
        self.columns
            .index_of(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&DbValue> {
        self.values.get(index)
    }
}
