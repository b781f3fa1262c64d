//! Sensor Time Series Tables
//!
//! Column-oriented tables of sensor samples aligned by row position, plus the
//! rolling-window primitives the fault checks are built on.

mod column;
mod rolling;
mod table;

pub use column::Column;
pub use rolling::{absolute_changes, rolling_spread, rolling_sum, sustained};
pub use table::Table;

use thiserror::Error;

/// Errors while building or reading a table
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// Column length differs from the table's row count
    #[error("column '{column}' has {actual} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Column name already present
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    /// Column name not present
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// Timestamps go backwards
    #[error("timestamps are not in ascending order at row {row}")]
    NonMonotonicTimestamps { row: usize },

    /// Operation needs a timestamp column
    #[error("table has no timestamp column")]
    MissingTimestamps,
}
