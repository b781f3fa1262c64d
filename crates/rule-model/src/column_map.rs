//! Column Maps and Resolved Inputs

use crate::InputSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied mapping from role or BRICK class to a data column.
///
/// Keys may be a BRICK class (`Supply_Air_Temperature_Sensor`), a
/// `Brick|column` pair for disambiguation, or a rule input key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMap(BTreeMap<String, String>);

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, column: impl Into<String>) {
        self.0.insert(key.into(), column.into());
    }

    pub fn with(mut self, key: impl Into<String>, column: impl Into<String>) -> Self {
        self.insert(key, column);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// An input bound to a concrete table column
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    pub spec: InputSpec,
    pub column: String,
}

/// Inputs of one rule bound to table columns, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedColumns(Vec<ResolvedInput>);

impl ResolvedColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, input: ResolvedInput) {
        self.0.push(input);
    }

    /// Column bound to an input key
    pub fn column(&self, role: &str) -> Option<&str> {
        self.get(role).map(|r| r.column.as_str())
    }

    pub fn get(&self, role: &str) -> Option<&ResolvedInput> {
        self.0.iter().find(|r| r.spec.role == role)
    }

    /// First input whose key or BRICK class is one of `names`
    pub fn find(&self, names: &[&str]) -> Option<&ResolvedInput> {
        names
            .iter()
            .find_map(|name| self.0.iter().find(|r| r.spec.matches(name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedInput> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ResolvedInput> for ResolvedColumns {
    fn from_iter<I: IntoIterator<Item = ResolvedInput>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(spec: InputSpec, column: &str) -> ResolvedInput {
        ResolvedInput {
            spec,
            column: column.to_string(),
        }
    }

    #[test]
    fn test_find_by_role_or_brick() {
        let columns: ResolvedColumns = vec![
            resolved(InputSpec::new("econ").brick("Damper_Position_Command"), "dpr"),
            resolved(InputSpec::new("heating_sig"), "htg"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            columns
                .find(&["Damper_Position_Command", "economizer_sig"])
                .map(|r| r.column.as_str()),
            Some("dpr")
        );
        assert_eq!(
            columns
                .find(&["Heating_Valve_Command", "heating_sig"])
                .map(|r| r.column.as_str()),
            Some("htg")
        );
        assert!(columns.find(&["Cooling_Valve_Command"]).is_none());
        assert_eq!(columns.column("heating_sig"), Some("htg"));
    }

    #[test]
    fn test_column_map_json() {
        let map: ColumnMap =
            serde_json::from_str(r#"{"Supply_Air_Temperature_Sensor": "SAT"}"#).unwrap();
        assert_eq!(map.get("Supply_Air_Temperature_Sensor"), Some("SAT"));
        assert_eq!(map.len(), 1);
    }
}
