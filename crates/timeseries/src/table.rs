//! Time-Indexed Table

use crate::{Column, TableError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Ordered, column-oriented table of sensor samples.
///
/// All columns have the same number of rows and are aligned by row position.
/// The optional timestamp column carries the sample times; it must be in
/// ascending order but may be irregularly spaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableRecord", into = "TableRecord")]
pub struct Table {
    /// Name of the timestamp column, if any
    timestamp_col: Option<String>,
    /// Sample times
    timestamps: Vec<DateTime<Utc>>,
    /// Data columns in insertion order
    columns: Vec<(String, Column)>,
    /// Row count, fixed by the first column or the timestamps
    rows: Option<usize>,
}

impl Table {
    /// Create an empty table without timestamps
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table indexed by the given sample times
    pub fn with_timestamps(
        name: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
    ) -> Result<Self, TableError> {
        if let Some(row) = timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(TableError::NonMonotonicTimestamps { row: row + 1 });
        }

        Ok(Self {
            timestamp_col: Some(name.into()),
            rows: Some(timestamps.len()),
            timestamps,
            columns: Vec::new(),
        })
    }

    /// Builder form of [`Table::insert_column`]
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        column: impl Into<Column>,
    ) -> Result<Self, TableError> {
        self.insert_column(name, column)?;
        Ok(self)
    }

    /// Add a new column; the name must not already exist
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        column: impl Into<Column>,
    ) -> Result<(), TableError> {
        let name = name.into();
        let column = column.into();

        if self.contains(&name) || self.timestamp_col.as_deref() == Some(name.as_str()) {
            return Err(TableError::DuplicateColumn(name));
        }
        self.check_length(&name, column.len())?;

        self.rows.get_or_insert(column.len());
        self.columns.push((name, column));
        Ok(())
    }

    /// Write a flag column, replacing an existing flag column of the same name.
    ///
    /// Refuses to overwrite a numeric data column.
    pub fn set_flag(&mut self, name: impl Into<String>, flags: Vec<bool>) -> Result<(), TableError> {
        let name = name.into();
        self.check_length(&name, flags.len())?;

        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) if existing.is_flag() => {
                *existing = Column::Flag(flags);
                Ok(())
            }
            Some(_) => Err(TableError::DuplicateColumn(name)),
            None => self.insert_column(name, Column::Flag(flags)),
        }
    }

    fn check_length(&self, name: &str, len: usize) -> Result<(), TableError> {
        match self.rows {
            Some(expected) if expected != len => Err(TableError::LengthMismatch {
                column: name.to_string(),
                expected,
                actual: len,
            }),
            _ => Ok(()),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.unwrap_or(0)
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a data column with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Look up a data column
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Look up a data column, failing on unknown names
    pub fn require(&self, name: &str) -> Result<&Column, TableError> {
        self.column(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// Column values as numbers
    pub fn numeric(&self, name: &str) -> Result<Cow<'_, [f64]>, TableError> {
        Ok(self.require(name)?.as_numeric())
    }

    /// Column values as booleans
    pub fn flags(&self, name: &str) -> Result<Cow<'_, [bool]>, TableError> {
        Ok(self.require(name)?.as_flags())
    }

    /// Data column names in insertion order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Names of all flag columns in insertion order
    pub fn flag_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.is_flag())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Name of the timestamp column
    pub fn timestamp_col(&self) -> Option<&str> {
        self.timestamp_col.as_deref()
    }

    /// Sample times, if the table is time-indexed
    pub fn timestamps(&self) -> Option<&[DateTime<Utc>]> {
        self.timestamp_col.as_ref().map(|_| self.timestamps.as_slice())
    }

    /// Sample times, failing when the table is not time-indexed
    pub fn require_timestamps(&self) -> Result<&[DateTime<Utc>], TableError> {
        self.timestamps().ok_or(TableError::MissingTimestamps)
    }
}

/// Serialized form of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp_col: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    timestamps: Vec<DateTime<Utc>>,
    #[serde(default)]
    columns: Vec<NamedColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamedColumn {
    name: String,
    values: Column,
}

impl TryFrom<TableRecord> for Table {
    type Error = TableError;

    fn try_from(record: TableRecord) -> Result<Self, Self::Error> {
        let mut table = match record.timestamp_col {
            Some(name) => Table::with_timestamps(name, record.timestamps)?,
            None if !record.timestamps.is_empty() => {
                Table::with_timestamps("timestamp", record.timestamps)?
            }
            None => Table::new(),
        };
        for named in record.columns {
            table.insert_column(named.name, named.values)?;
        }
        Ok(table)
    }
}

impl From<Table> for TableRecord {
    fn from(table: Table) -> Self {
        TableRecord {
            timestamp_col: table.timestamp_col,
            timestamps: table.timestamps,
            columns: table
                .columns
                .into_iter()
                .map(|(name, values)| NamedColumn { name, values })
                .collect(),
        }
    }
}
