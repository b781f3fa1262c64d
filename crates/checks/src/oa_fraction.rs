//! Outdoor-Air Fraction Check
//!
//! Compares the outdoor-air fraction implied by the mixing temperatures with
//! the design minimum implied by supply airflow, in heating and in
//! mechanical cooling at minimum damper.

use crate::roles::{
    read_role, require_roles, COOLING_COMMAND, DAMPER_COMMAND, HEATING_COMMAND, MIXED_AIR_TEMP,
    OUTSIDE_AIR_TEMP, RETURN_AIR_TEMP, SUPPLY_FAN_AIRFLOW, SUPPLY_FAN_SPEED,
};
use crate::{EvaluationError, Mask};
use rule_model::{OaFractionParams, ResolvedColumns, UnitScale};
use timeseries::Table;

/// Samples for one outdoor-air fraction evaluation. Commands are 0.0-1.0.
#[derive(Debug, Clone, Copy)]
pub struct OaFractionInputs<'a> {
    pub rat: &'a [f64],
    pub oat: &'a [f64],
    pub mat: &'a [f64],
    pub supply_airflow: &'a [f64],
    pub supply_fan: &'a [f64],
    pub economizer: &'a [f64],
    pub heating: &'a [f64],
    pub cooling: &'a [f64],
}

/// Outdoor-air fraction `(MAT - RAT) / (OAT - RAT)`, 0 when OAT equals RAT,
/// clipped below at 0. NaN stays NaN.
pub fn oa_fraction(rat: f64, oat: f64, mat: f64) -> f64 {
    let denom = oat - rat;
    let fraction = if denom != 0.0 { (mat - rat) / denom } else { 0.0 };
    if fraction < 0.0 {
        0.0
    } else {
        fraction
    }
}

pub fn check_oa_fraction(inputs: &OaFractionInputs<'_>, params: &OaFractionParams) -> Mask {
    (0..inputs.rat.len())
        .map(|i| {
            let rat = inputs.rat[i];
            let oat = inputs.oat[i];
            let airflow = inputs.supply_airflow[i];

            let design_fraction = if airflow > 0.0 {
                params.ahu_min_oa_cfm_design / airflow
            } else {
                0.0
            };
            let error = (oa_fraction(rat, oat, inputs.mat[i]) - design_fraction).abs();

            let qualifies = (rat - oat).abs() >= params.oat_rat_delta_min
                && error > params.airflow_err_thres
                && inputs.supply_fan[i] > 0.0;
            if !qualifies {
                return false;
            }

            let heating = inputs.heating[i] > 0.0;
            let min_oa_cooling = inputs.heating[i] == 0.0
                && inputs.cooling[i] > 0.0
                && inputs.economizer[i] <= params.ahu_min_oa_dpr;
            heating || min_oa_cooling
        })
        .collect()
}

pub(crate) fn evaluate(
    params: &OaFractionParams,
    table: &Table,
    columns: &ResolvedColumns,
) -> Result<Mask, EvaluationError> {
    let [rat, oat, mat, supply_airflow] = require_roles(
        "oa_fraction",
        table,
        columns,
        [RETURN_AIR_TEMP, OUTSIDE_AIR_TEMP, MIXED_AIR_TEMP, SUPPLY_FAN_AIRFLOW],
    )?;
    let Some(supply_fan) = read_role(table, columns, SUPPLY_FAN_SPEED, UnitScale::Auto)? else {
        return Err(EvaluationError::MissingRole {
            check: "oa_fraction",
            roles: vec![SUPPLY_FAN_SPEED.brick.to_string()],
        });
    };

    let zeros = vec![0.0; table.len()];
    let optional = |role| -> Result<Vec<f64>, EvaluationError> {
        Ok(read_role(table, columns, role, UnitScale::Auto)?.unwrap_or_else(|| zeros.clone()))
    };
    let economizer = optional(DAMPER_COMMAND)?;
    let heating = optional(HEATING_COMMAND)?;
    let cooling = optional(COOLING_COMMAND)?;

    let inputs = OaFractionInputs {
        rat: &rat,
        oat: &oat,
        mat: &mat,
        supply_airflow: &supply_airflow,
        supply_fan: &supply_fan,
        economizer: &economizer,
        heating: &heating,
        cooling: &cooling,
    };
    Ok(check_oa_fraction(&inputs, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(heating: f64, cooling: f64, economizer: f64, mat: f64) -> bool {
        let inputs = OaFractionInputs {
            rat: &[70.0],
            oat: &[40.0],
            mat: &[mat],
            supply_airflow: &[10_000.0],
            supply_fan: &[0.8],
            economizer: &[economizer],
            heating: &[heating],
            cooling: &[cooling],
        };
        check_oa_fraction(&inputs, &OaFractionParams::default())[0]
    }

    #[test]
    fn test_oa_fraction_formula() {
        assert_eq!(oa_fraction(70.0, 40.0, 64.0), 0.2);
        assert_eq!(oa_fraction(70.0, 70.0, 65.0), 0.0);
        assert_eq!(oa_fraction(70.0, 40.0, 75.0), 0.0);
        assert!(oa_fraction(f64::NAN, 40.0, 64.0).is_nan());
    }

    #[test]
    fn test_heating_mode_fraction_error() {
        // design minimum is 1000 / 10000 = 0.1; MAT 58 gives a fraction of 0.4
        assert!(run(0.5, 0.0, 0.1, 58.0));
        // MAT 67 gives 0.1, matching design
        assert!(!run(0.5, 0.0, 0.1, 67.0));
    }

    #[test]
    fn test_cooling_needs_minimum_damper() {
        assert!(run(0.0, 0.5, 0.1, 58.0));
        assert!(!run(0.0, 0.5, 0.6, 58.0));
    }

    #[test]
    fn test_small_temperature_split_never_flags() {
        let inputs = OaFractionInputs {
            rat: &[70.0],
            oat: &[68.0],
            mat: &[69.0],
            supply_airflow: &[10_000.0],
            supply_fan: &[0.8],
            economizer: &[0.0],
            heating: &[1.0],
            cooling: &[0.0],
        };
        assert!(!check_oa_fraction(&inputs, &OaFractionParams::default())[0]);
    }

    #[test]
    fn test_missing_data_never_flags() {
        assert!(!run(0.5, 0.0, 0.1, f64::NAN));
    }
}
