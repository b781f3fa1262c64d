//! Flatline Check

use crate::{roles::read_input, EvaluationError, Mask};
use rule_model::{FlatlineParams, ResolvedColumns, UnitScale};
use timeseries::{rolling_spread, Table};

/// True where the spread over the trailing `window` samples is below
/// `tolerance`.
///
/// The first `window - 1` rows are always false, so a flat period starts
/// `window - 1` rows before its first flagged row. Windows with NaN never flag.
pub fn check_flatline(values: &[f64], tolerance: f64, window: usize) -> Mask {
    rolling_spread(values, window)
        .into_iter()
        .map(|spread| spread < tolerance)
        .collect()
}

/// OR of the flatline check over every resolved input
pub(crate) fn evaluate(
    params: &FlatlineParams,
    table: &Table,
    columns: &ResolvedColumns,
) -> Result<Mask, EvaluationError> {
    let mut mask = vec![false; table.len()];
    for input in columns.iter() {
        let values = read_input(table, input, UnitScale::Fraction)?;
        let flat = check_flatline(&values, params.tolerance, params.window);
        for (flag, is_flat) in mask.iter_mut().zip(flat) {
            *flag |= is_flat;
        }
    }
    Ok(mask)
}
