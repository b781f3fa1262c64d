//! Column Resolver
//!
//! Binds rule inputs to table columns through a caller-supplied column map.

use crate::MissingColumnError;
use rule_model::{
    ColumnMap, InputBounds, InputSpec, ResolvedColumns, ResolvedInput, Rule, RuleLoadError,
    UnitSystem,
};
use timeseries::Table;
use tracing::debug;

/// Column name an input maps to, before checking the table.
///
/// With a BRICK class the lookup order is `map[brick]`, `map["brick|column"]`,
/// `map[column]`, `map[key]`, then the literal column; without one it is
/// `map[column]`, `map[key]`, then the literal column.
pub fn candidate_column(input: &InputSpec, map: &ColumnMap) -> String {
    let literal = input.literal_column();
    let mapped = match input.brick.as_deref() {
        Some(brick) => map
            .get(brick)
            .or_else(|| map.get(&format!("{brick}|{literal}")))
            .or_else(|| map.get(literal))
            .or_else(|| map.get(&input.role)),
        None => map.get(literal).or_else(|| map.get(&input.role)),
    };
    mapped.unwrap_or(literal).to_string()
}

/// Result of resolving one rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Inputs whose column exists in the table
    pub columns: ResolvedColumns,
    /// Required roles with no table column
    pub missing_required: Vec<String>,
    /// Optional roles with no table column
    pub missing_optional: Vec<String>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.missing_required.is_empty()
    }
}

/// Resolve every input of a rule against a table
pub fn resolve(rule: &Rule, map: &ColumnMap, table: &Table) -> Resolution {
    let mut resolution = Resolution::default();

    for input in rule.inputs() {
        let column = candidate_column(input, map);
        if table.contains(&column) {
            resolution.columns.push(ResolvedInput {
                spec: input.clone(),
                column,
            });
        } else if input.required {
            resolution.missing_required.push(input.role.clone());
        } else {
            debug!(
                "Rule '{}': optional input '{}' has no column '{}'",
                rule.name(),
                input.role,
                column
            );
            resolution.missing_optional.push(input.role.clone());
        }
    }

    resolution
}

/// Resolve a rule, failing with every unresolved required role at once
pub fn resolve_required(
    rule: &Rule,
    map: &ColumnMap,
    table: &Table,
) -> Result<ResolvedColumns, MissingColumnError> {
    let resolution = resolve(rule, map, table);
    if !resolution.is_complete() {
        return Err(MissingColumnError {
            rule: rule.name().to_string(),
            roles: resolution.missing_required,
        });
    }
    Ok(resolution.columns)
}

/// Bounds of a rule for a unit system.
///
/// Bounds declared without a per-unit split apply to every unit system.
pub fn bounds_for(rule: &Rule, units: UnitSystem) -> Result<Vec<InputBounds>, RuleLoadError> {
    rule.bounds_for(units)
}
