//! Per-operation options for introspection and ad hoc queries.

use serde::{Deserialize, Serialize};

/// Limits applied by the query executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Largest page size a request may ask for
    pub max_limit: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { max_limit: 10_000 }
    }
}

impl QueryConfig {
    /// Builder method to set the maximum page size.
    pub fn with_max_limit(mut self, max_limit: i64) -> Self {
        self.max_limit = max_limit;
        self
    }
}

/// Options for listing tables.
///
/// Row counts default to planner estimates (`pg_class.reltuples`), which
/// are only as fresh as the last `ANALYZE` or autovacuum run. Exact counts
/// cost a full `count(*)` per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableListOptions {
    /// Replace estimates with live `count(*)` results for tables
    pub exact_row_counts: bool,
}

impl TableListOptions {
    /// Builder method to request exact row counts.
    pub fn with_exact_row_counts(mut self, exact: bool) -> Self {
        self.exact_row_counts = exact;
        self
    }
}
