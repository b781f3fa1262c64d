//! Bounds Check

use crate::{roles::read_input, EvaluationError, Mask};
use rule_model::{InputBounds, ResolvedColumns, UnitScale};
use timeseries::Table;

/// True where a value is outside `[low, high]`; NaN never flags
pub fn check_bounds(values: &[f64], low: f64, high: f64) -> Mask {
    values.iter().map(|&v| v < low || v > high).collect()
}

/// OR of the bounds check over every resolved input that has bounds
pub(crate) fn evaluate(
    bounds: &[InputBounds],
    table: &Table,
    columns: &ResolvedColumns,
) -> Result<Mask, EvaluationError> {
    let mut mask = vec![false; table.len()];
    for input_bounds in bounds {
        let Some(input) = columns.get(&input_bounds.role) else {
            continue;
        };
        let values = read_input(table, input, UnitScale::Fraction)?;
        let violations = check_bounds(&values, input_bounds.low, input_bounds.high);
        for (flag, violated) in mask.iter_mut().zip(violations) {
            *flag |= violated;
        }
    }
    Ok(mask)
}
