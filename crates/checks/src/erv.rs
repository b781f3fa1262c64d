//! Energy-Recovery Effectiveness Check

use crate::roles::{require_roles, ERV_EAT_ENTER, ERV_OAT_ENTER, ERV_OAT_LEAVING};
use crate::{EvaluationError, Mask};
use rule_model::{ErvEfficiencyParams, ResolvedColumns};
use timeseries::Table;

/// Outside-air side effectiveness, 0 when the entering temperatures match
pub fn erv_effectiveness(oat_enter: f64, oat_leaving: f64, eat_enter: f64) -> f64 {
    let denom = eat_enter - oat_enter;
    if denom != 0.0 {
        (oat_leaving - oat_enter) / denom
    } else {
        0.0
    }
}

/// True where effectiveness is outside the band for the current mode.
///
/// Heating below `oat_low_threshold`, cooling above `oat_high_threshold`;
/// never flags in between or when the entering temperatures are too close.
pub fn check_erv_efficiency(
    oat_enter: &[f64],
    oat_leaving: &[f64],
    eat_enter: &[f64],
    params: &ErvEfficiencyParams,
) -> Mask {
    oat_enter
        .iter()
        .zip(oat_leaving)
        .zip(eat_enter)
        .map(|((&enter, &leaving), &eat)| {
            let separated = (enter - eat).abs() >= params.oat_rat_delta_min;
            if !separated {
                return false;
            }
            let eff = erv_effectiveness(enter, leaving, eat);
            let outside = |min: f64, max: f64| eff < min || eff > max;

            if enter < params.oat_low_threshold {
                outside(params.min_heating, params.max_heating)
            } else if enter > params.oat_high_threshold {
                outside(params.min_cooling, params.max_cooling)
            } else {
                false
            }
        })
        .collect()
}

pub(crate) fn evaluate(
    params: &ErvEfficiencyParams,
    table: &Table,
    columns: &ResolvedColumns,
) -> Result<Mask, EvaluationError> {
    let [oat_enter, oat_leaving, eat_enter] = require_roles(
        "erv_efficiency",
        table,
        columns,
        [ERV_OAT_ENTER, ERV_OAT_LEAVING, ERV_EAT_ENTER],
    )?;
    Ok(check_erv_efficiency(&oat_enter, &oat_leaving, &eat_enter, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(enter: f64, leaving: f64, eat: f64) -> bool {
        check_erv_efficiency(&[enter], &[leaving], &[eat], &ErvEfficiencyParams::default())[0]
    }

    #[test]
    fn test_heating_band() {
        // 20F outside, 70F exhaust: 55F leaving is 0.7 effective
        assert!(!flags(20.0, 55.0, 70.0));
        // 25F leaving is only 0.1 effective
        assert!(flags(20.0, 25.0, 70.0));
    }

    #[test]
    fn test_cooling_band() {
        // 90F outside, 70F exhaust: 76F leaving is 0.7 effective
        assert!(!flags(90.0, 76.0, 70.0));
        assert!(flags(90.0, 89.0, 70.0));
    }

    #[test]
    fn test_deadband_and_small_delta() {
        assert!(!flags(60.0, 60.0, 75.0));
        assert!(!flags(52.0, 52.0, 54.0));
        assert!(!flags(f64::NAN, 52.0, 70.0));
    }
}
