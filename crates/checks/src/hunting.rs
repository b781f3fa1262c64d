//! Operating-State Hunting Check
//!
//! An AHU hunting between economizer, heating and cooling modes changes its
//! operating state far more often than a stable control loop would.

use crate::roles::{read_role, COOLING_COMMAND, DAMPER_COMMAND, HEATING_COMMAND, SUPPLY_FAN_SPEED};
use crate::{EvaluationError, Mask};
use rule_model::{HuntingParams, ResolvedColumns, UnitScale};
use timeseries::{absolute_changes, rolling_sum, Table};

/// Minimum number of mode signals a hunting rule must declare
pub const MIN_MODE_SIGNALS: usize = 2;

/// Command signals as 0.0-1.0 fractions; absent signals are `None`
#[derive(Debug, Clone, Default)]
pub struct ModeSignals {
    pub economizer: Option<Vec<f64>>,
    pub supply_fan: Option<Vec<f64>>,
    pub heating: Option<Vec<f64>>,
    pub cooling: Option<Vec<f64>>,
}

impl ModeSignals {
    fn count(&self) -> usize {
        [&self.economizer, &self.supply_fan, &self.heating, &self.cooling]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }
}

fn active(signal: &Option<Vec<f64>>, row: usize, threshold: f64) -> f64 {
    match signal.as_ref().map(|s| s[row]) {
        Some(v) if v > threshold => 1.0,
        _ => 0.0,
    }
}

/// Operating-state code per row: number of active modes.
///
/// A mode is active when its command is above 0, or above `fan_threshold`
/// for the supply fan. Missing data reads as inactive.
pub fn operating_state(signals: &ModeSignals, fan_threshold: f64, len: usize) -> Vec<f64> {
    (0..len)
        .map(|row| {
            active(&signals.economizer, row, 0.0)
                + active(&signals.supply_fan, row, fan_threshold)
                + active(&signals.heating, row, 0.0)
                + active(&signals.cooling, row, 0.0)
        })
        .collect()
}

/// True where the state code changed more than `delta_os_max` times over
/// the trailing window
pub fn check_hunting(signals: &ModeSignals, params: &HuntingParams, len: usize) -> Mask {
    let state = operating_state(signals, params.ahu_min_oa_dpr, len);
    rolling_sum(&absolute_changes(&state), params.window)
        .into_iter()
        .map(|changes| changes > params.delta_os_max)
        .collect()
}

pub(crate) fn evaluate(
    params: &HuntingParams,
    table: &Table,
    columns: &ResolvedColumns,
) -> Result<Mask, EvaluationError> {
    let read = |role| read_role(table, columns, role, UnitScale::Auto);
    let signals = ModeSignals {
        economizer: read(DAMPER_COMMAND)?,
        supply_fan: read(SUPPLY_FAN_SPEED)?,
        heating: read(HEATING_COMMAND)?,
        cooling: read(COOLING_COMMAND)?,
    };

    let found = signals.count();
    if found < MIN_MODE_SIGNALS {
        return Err(EvaluationError::InsufficientSignals {
            required: MIN_MODE_SIGNALS,
            found,
        });
    }
    Ok(check_hunting(&signals, params, table.len()))
}
