//! Restricted Rule Expressions
//!
//! A small formula language over input aliases and numeric parameters:
//! arithmetic, comparisons, boolean `& | ~` (or `and or not`), and the
//! functions `min`, `max`, `abs` and `sqrt` (`np.minimum`, `np.maximum`,
//! `np.abs` and `np.sqrt` are accepted as aliases). There are no attribute
//! lookups, no assignments and no other calls.

mod eval;
mod lexer;
mod parser;

use crate::{EvaluationError, Mask};
use eval::Scope;
use rule_model::{ExpressionParams, ResolvedColumns};
use std::collections::BTreeMap;
use timeseries::Table;

/// Maximum nesting depth of an expression tree
pub const MAX_DEPTH: usize = 64;

/// A parsed formula
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: parser::Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, EvaluationError> {
        Ok(Self {
            source: source.to_string(),
            root: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate over every row of `table`.
    ///
    /// Identifiers resolve to input aliases first, then to `constants`.
    pub fn evaluate(
        &self,
        table: &Table,
        columns: &ResolvedColumns,
        constants: &BTreeMap<String, f64>,
    ) -> Result<Mask, EvaluationError> {
        let scope = Scope {
            table,
            columns,
            constants,
        };
        Ok(eval::to_mask(eval::evaluate(&self.root, &scope)?, table.len()))
    }
}

/// Parse and evaluate a formula in one step
pub fn check_expression(
    expression: &str,
    table: &Table,
    columns: &ResolvedColumns,
    constants: &BTreeMap<String, f64>,
) -> Result<Mask, EvaluationError> {
    Expression::parse(expression)?.evaluate(table, columns, constants)
}

pub(crate) fn evaluate(
    params: &ExpressionParams,
    table: &Table,
    columns: &ResolvedColumns,
) -> Result<Mask, EvaluationError> {
    check_expression(&params.expression, table, columns, &params.constants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rule_model::{InputSpec, ResolvedInput};

    fn fixture() -> (Table, ResolvedColumns) {
        let table = Table::new()
            .with_column("dp", vec![0.5, 1.2, f64::NAN, 0.4])
            .unwrap()
            .with_column("dp_sp", vec![1.0, 1.0, 1.0, 1.0])
            .unwrap()
            .with_column("vfd", vec![0.99, 0.99, 0.99, 0.5])
            .unwrap();
        let columns = [
            ("duct_static", "dp"),
            ("duct_static_setpoint", "dp_sp"),
            ("supply_vfd_speed", "vfd"),
        ]
        .into_iter()
        .map(|(role, column)| ResolvedInput {
            spec: InputSpec::new(role),
            column: column.to_string(),
        })
        .collect();
        (table, columns)
    }

    fn constants() -> BTreeMap<String, f64> {
        [("static_err_thres", 0.1), ("vfd_max", 0.95)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_duct_static_rule() {
        let (table, columns) = fixture();
        let mask = check_expression(
            "(duct_static < duct_static_setpoint - static_err_thres) & (supply_vfd_speed >= vfd_max)",
            &table,
            &columns,
            &constants(),
        )
        .unwrap();
        assert_eq!(mask, vec![true, false, false, false]);
    }

    #[test]
    fn test_nan_row_false_even_under_not() {
        let (table, columns) = fixture();
        let mask = check_expression("~(duct_static > 1)", &table, &columns, &constants()).unwrap();
        assert_eq!(mask, vec![true, false, false, true]);
    }

    #[test]
    fn test_functions() {
        let (table, columns) = fixture();
        let mask = check_expression(
            "np.abs(duct_static - duct_static_setpoint) > max(static_err_thres, 0.3)",
            &table,
            &columns,
            &constants(),
        )
        .unwrap();
        assert_eq!(mask, vec![true, false, false, true]);
    }

    #[test]
    fn test_scalar_result_broadcasts() {
        let (table, columns) = fixture();
        let mask = check_expression("vfd_max > 0.5", &table, &columns, &constants()).unwrap();
        assert_eq!(mask, vec![true; 4]);
    }

    #[test]
    fn test_unknown_identifier() {
        let (table, columns) = fixture();
        assert!(matches!(
            check_expression("oat > 50", &table, &columns, &constants()),
            Err(EvaluationError::UnknownIdentifier(name)) if name == "oat"
        ));
    }

    #[test]
    fn test_division_by_zero_is_false() {
        let table = Table::new().with_column("a", vec![1.0, 2.0]).unwrap();
        let columns = std::iter::once(ResolvedInput {
            spec: InputSpec::new("a"),
            column: "a".to_string(),
        })
        .collect();
        let mask =
            check_expression("a / (a - 1) > 0", &table, &columns, &BTreeMap::new()).unwrap();
        assert_eq!(mask, vec![false, true]);
    }
}
