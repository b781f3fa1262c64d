//! Table Columns

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// One named series of a table.
///
/// Numeric columns use NaN for missing samples; in JSON they are written as
/// `null`. Flag columns are the boolean output of a fault rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column {
    /// Boolean series (fault flags, binary status points)
    Flag(Vec<bool>),
    /// Numeric sensor or command series
    Numeric(#[serde(with = "nan_as_null")] Vec<f64>),
}

impl Column {
    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            Column::Flag(values) => values.len(),
            Column::Numeric(values) => values.len(),
        }
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is a flag column
    pub fn is_flag(&self) -> bool {
        matches!(self, Column::Flag(_))
    }

    /// Values as numbers; flags read as 0.0/1.0
    pub fn as_numeric(&self) -> Cow<'_, [f64]> {
        match self {
            Column::Numeric(values) => Cow::Borrowed(values.as_slice()),
            Column::Flag(values) => {
                Cow::Owned(values.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect())
            }
        }
    }

    /// Values as booleans; a number is true when finite and non-zero
    pub fn as_flags(&self) -> Cow<'_, [bool]> {
        match self {
            Column::Flag(values) => Cow::Borrowed(values.as_slice()),
            Column::Numeric(values) => {
                Cow::Owned(values.iter().map(|v| v.is_finite() && *v != 0.0).collect())
            }
        }
    }

    /// Number of true rows (flags) or non-zero rows (numbers)
    pub fn count_true(&self) -> usize {
        self.as_flags().iter().filter(|&&v| v).count()
    }
}

impl From<Vec<f64>> for Column {
    fn from(values: Vec<f64>) -> Self {
        Column::Numeric(values)
    }
}

impl From<Vec<bool>> for Column {
    fn from(values: Vec<bool>) -> Self {
        Column::Flag(values)
    }
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let optional: Vec<Option<f64>> = values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        optional.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let optional: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(optional.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_as_numeric() {
        let col = Column::Flag(vec![true, false, true]);
        assert_eq!(col.as_numeric().as_ref(), &[1.0, 0.0, 1.0]);
        assert_eq!(col.count_true(), 2);
    }

    #[test]
    fn test_numeric_as_flags_ignores_nan() {
        let col = Column::Numeric(vec![0.0, 2.5, f64::NAN]);
        assert_eq!(col.as_flags().as_ref(), &[false, true, false]);
    }

    #[test]
    fn test_json_null_reads_as_nan() {
        let col: Column = serde_json::from_str("[1.0, null, 3]").unwrap();
        match col {
            Column::Numeric(values) => {
                assert_eq!(values[0], 1.0);
                assert!(values[1].is_nan());
                assert_eq!(values[2], 3.0);
            }
            Column::Flag(_) => panic!("expected numeric column"),
        }

        let flags: Column = serde_json::from_str("[true, false]").unwrap();
        assert!(flags.is_flag());
    }
}
