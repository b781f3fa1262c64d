//! Vectorized Expression Evaluation
//!
//! Booleans are carried as 1.0 / 0.0. NaN propagates through every operator
//! and function, and a NaN row is false in the final mask.

use super::parser::{BinaryOp, Expr, Function};
use crate::roles::read_input;
use crate::{EvaluationError, Mask};
use rule_model::{ResolvedColumns, UnitScale};
use std::collections::BTreeMap;
use timeseries::Table;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Scalar(f64),
    Series(Vec<f64>),
}

/// Names visible to an expression
pub(crate) struct Scope<'a> {
    pub table: &'a Table,
    pub columns: &'a ResolvedColumns,
    pub constants: &'a BTreeMap<String, f64>,
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Result<Value, EvaluationError> {
        if let Some(input) = self.columns.get(name) {
            return Ok(Value::Series(read_input(self.table, input, UnitScale::Fraction)?));
        }
        if let Some(&value) = self.constants.get(name) {
            return Ok(Value::Scalar(value));
        }
        Err(EvaluationError::UnknownIdentifier(name.to_string()))
    }
}

fn truthy(v: f64) -> bool {
    v.is_finite() && v != 0.0
}

fn boolean(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn apply_binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b == 0.0 => f64::NAN,
        BinaryOp::Div => a / b,
        BinaryOp::Lt => boolean(a < b),
        BinaryOp::Le => boolean(a <= b),
        BinaryOp::Gt => boolean(a > b),
        BinaryOp::Ge => boolean(a >= b),
        BinaryOp::Eq => boolean(a == b),
        BinaryOp::Ne => boolean(a != b),
        BinaryOp::And => boolean(truthy(a) && truthy(b)),
        BinaryOp::Or => boolean(truthy(a) || truthy(b)),
    }
}

fn apply_call(function: Function, args: &[f64]) -> f64 {
    match (function, args) {
        (Function::Min, [a, b]) if a.is_nan() || b.is_nan() => f64::NAN,
        (Function::Min, [a, b]) => a.min(*b),
        (Function::Max, [a, b]) if a.is_nan() || b.is_nan() => f64::NAN,
        (Function::Max, [a, b]) => a.max(*b),
        (Function::Abs, [a]) => a.abs(),
        (Function::Sqrt, [a]) => a.sqrt(),
        _ => f64::NAN,
    }
}

fn map_unary(value: Value, f: impl Fn(f64) -> f64) -> Value {
    match value {
        Value::Scalar(v) => Value::Scalar(f(v)),
        Value::Series(values) => Value::Series(values.into_iter().map(f).collect()),
    }
}

fn map_binary(lhs: Value, rhs: Value, f: impl Fn(f64, f64) -> f64) -> Value {
    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(f(a, b)),
        (Value::Series(a), Value::Scalar(b)) => {
            Value::Series(a.into_iter().map(|x| f(x, b)).collect())
        }
        (Value::Scalar(a), Value::Series(b)) => {
            Value::Series(b.into_iter().map(|y| f(a, y)).collect())
        }
        (Value::Series(a), Value::Series(b)) => {
            Value::Series(a.into_iter().zip(b).map(|(x, y)| f(x, y)).collect())
        }
    }
}

pub(crate) fn evaluate(expr: &Expr, scope: &Scope<'_>) -> Result<Value, EvaluationError> {
    Ok(match expr {
        Expr::Literal(v) => Value::Scalar(*v),
        Expr::Variable(name) => scope.lookup(name)?,
        Expr::Neg(inner) => map_unary(evaluate(inner, scope)?, |v| -v),
        Expr::Not(inner) => map_unary(evaluate(inner, scope)?, |v| {
            if v.is_nan() {
                f64::NAN
            } else {
                boolean(!truthy(v))
            }
        }),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, scope)?;
            let rhs = evaluate(rhs, scope)?;
            map_binary(lhs, rhs, |a, b| apply_binary(*op, a, b))
        }
        Expr::Call { function, args } => {
            let mut values = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            match values.len() {
                1 => map_unary(values.remove(0), |a| apply_call(*function, &[a])),
                _ => {
                    let rhs = values.pop().unwrap_or(Value::Scalar(f64::NAN));
                    let lhs = values.pop().unwrap_or(Value::Scalar(f64::NAN));
                    map_binary(lhs, rhs, |a, b| apply_call(*function, &[a, b]))
                }
            }
        }
    })
}

/// Row mask from an evaluated value; scalars broadcast to every row
pub(crate) fn to_mask(value: Value, rows: usize) -> Mask {
    match value {
        Value::Scalar(v) => vec![truthy(v); rows],
        Value::Series(values) => values.into_iter().map(truthy).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_propagates() {
        for op in [BinaryOp::Add, BinaryOp::Lt, BinaryOp::And, BinaryOp::Or] {
            assert!(apply_binary(op, f64::NAN, 1.0).is_nan());
        }
        assert!(apply_binary(BinaryOp::Div, 1.0, 0.0).is_nan());
        assert!(apply_call(Function::Min, &[f64::NAN, 1.0]).is_nan());
        assert!(apply_call(Function::Sqrt, &[-4.0]).is_nan());
    }

    #[test]
    fn test_to_mask() {
        assert_eq!(
            to_mask(Value::Series(vec![1.0, 0.0, f64::NAN, f64::INFINITY]), 4),
            vec![true, false, false, false]
        );
        assert_eq!(to_mask(Value::Scalar(1.0), 2), vec![true, true]);
    }
}
