//! Typed Check Parameters
//!
//! Raw `params` maps are converted to one struct per check type and validated
//! once, when the rule is built.

use crate::InvalidParameterError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw parameter value from a declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric value, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean value, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Raw parameter map, sorted by key
pub type Params = BTreeMap<String, ParamValue>;

/// Resolved `[low, high]` for one input of a bounds rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputBounds {
    /// Input key
    pub role: String,
    /// BRICK class, or the key when none is declared
    pub label: String,
    pub low: f64,
    pub high: f64,
}

/// Flatline check parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatlineParams {
    /// Spread below which a window counts as flat
    pub tolerance: f64,
    /// Window length in samples
    pub window: usize,
}

impl Default for FlatlineParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            window: 12,
        }
    }
}

/// Operating-state hunting parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuntingParams {
    /// Allowed state changes per window
    pub delta_os_max: f64,
    /// Fan speed above which the fan counts as running
    pub ahu_min_oa_dpr: f64,
    /// Window length in samples
    pub window: usize,
}

impl Default for HuntingParams {
    fn default() -> Self {
        Self {
            delta_os_max: 10.0,
            ahu_min_oa_dpr: 0.1,
            window: 60,
        }
    }
}

/// Outdoor-air fraction parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OaFractionParams {
    pub airflow_err_thres: f64,
    /// Design minimum outdoor airflow
    pub ahu_min_oa_cfm_design: f64,
    /// Minimum |RAT - OAT| for the fraction to be meaningful
    pub oat_rat_delta_min: f64,
    /// Damper position treated as "at minimum"
    pub ahu_min_oa_dpr: f64,
}

impl Default for OaFractionParams {
    fn default() -> Self {
        Self {
            airflow_err_thres: 0.1,
            ahu_min_oa_cfm_design: 1000.0,
            oat_rat_delta_min: 5.0,
            ahu_min_oa_dpr: 0.1,
        }
    }
}

/// ERV effectiveness parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErvEfficiencyParams {
    pub min_heating: f64,
    pub max_heating: f64,
    pub min_cooling: f64,
    pub max_cooling: f64,
    /// Outdoor temperature below which the ERV is heating
    pub oat_low_threshold: f64,
    /// Outdoor temperature above which the ERV is cooling
    pub oat_high_threshold: f64,
    pub oat_rat_delta_min: f64,
}

impl Default for ErvEfficiencyParams {
    fn default() -> Self {
        Self {
            min_heating: 0.5,
            max_heating: 0.9,
            min_cooling: 0.5,
            max_cooling: 0.9,
            oat_low_threshold: 55.0,
            oat_high_threshold: 65.0,
            oat_rat_delta_min: 5.0,
        }
    }
}

/// Expression rule parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionParams {
    pub expression: String,
    /// Numeric and boolean params, bound as named constants
    pub constants: BTreeMap<String, f64>,
}

/// Validated parameters, one variant per check type
#[derive(Debug, Clone, PartialEq)]
pub enum CheckParams {
    Bounds(Vec<InputBounds>),
    Flatline(FlatlineParams),
    Expression(ExpressionParams),
    Hunting(HuntingParams),
    OaFraction(OaFractionParams),
    ErvEfficiency(ErvEfficiencyParams),
}

/// Typed access to a raw parameter map
pub(crate) struct ParamReader<'a> {
    rule: &'a str,
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    pub(crate) fn new(rule: &'a str, params: &'a Params) -> Self {
        Self { rule, params }
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> InvalidParameterError {
        InvalidParameterError::new(self.rule, key, reason)
    }

    pub(crate) fn number(&self, key: &str, default: f64) -> Result<f64, InvalidParameterError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(ParamValue::Number(v)) if v.is_finite() => Ok(*v),
            Some(ParamValue::Number(v)) => Err(self.invalid(key, format!("{v} is not finite"))),
            Some(other) => Err(self.invalid(key, format!("expected a number, got {other:?}"))),
        }
    }

    fn non_negative(&self, key: &str, default: f64) -> Result<f64, InvalidParameterError> {
        let v = self.number(key, default)?;
        if v < 0.0 {
            return Err(self.invalid(key, format!("{v} must be >= 0")));
        }
        Ok(v)
    }

    fn positive(&self, key: &str, default: f64) -> Result<f64, InvalidParameterError> {
        let v = self.number(key, default)?;
        if v <= 0.0 {
            return Err(self.invalid(key, format!("{v} must be > 0")));
        }
        Ok(v)
    }

    fn fraction(&self, key: &str, default: f64) -> Result<f64, InvalidParameterError> {
        let v = self.number(key, default)?;
        if !(0.0..=1.0).contains(&v) {
            return Err(self.invalid(key, format!("{v} must be within [0, 1]")));
        }
        Ok(v)
    }

    /// Window length: a whole number of samples, at least 1
    pub(crate) fn window(&self, key: &str) -> Result<Option<usize>, InvalidParameterError> {
        let Some(value) = self.params.get(key) else {
            return Ok(None);
        };
        match value.as_f64() {
            Some(v) if v >= 1.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(Some(v as usize)),
            Some(v) => Err(self.invalid(key, format!("{v} is not a whole number >= 1"))),
            None => Err(self.invalid(key, format!("expected a number, got {value:?}"))),
        }
    }

    fn ordered(
        &self,
        low_key: &str,
        low: f64,
        high_key: &str,
        high: f64,
    ) -> Result<(), InvalidParameterError> {
        if low > high {
            return Err(self.invalid(low_key, format!("{low} exceeds {high_key} ({high})")));
        }
        Ok(())
    }
}

impl FlatlineParams {
    pub(crate) fn read(reader: &ParamReader<'_>) -> Result<Self, InvalidParameterError> {
        let defaults = Self::default();
        Ok(Self {
            tolerance: reader.non_negative("tolerance", defaults.tolerance)?,
            window: reader.window("window")?.unwrap_or(defaults.window),
        })
    }
}

impl HuntingParams {
    pub(crate) fn read(reader: &ParamReader<'_>) -> Result<Self, InvalidParameterError> {
        let defaults = Self::default();
        Ok(Self {
            delta_os_max: reader.non_negative("delta_os_max", defaults.delta_os_max)?,
            ahu_min_oa_dpr: reader.fraction("ahu_min_oa_dpr", defaults.ahu_min_oa_dpr)?,
            window: reader.window("window")?.unwrap_or(defaults.window),
        })
    }
}

impl OaFractionParams {
    pub(crate) fn read(reader: &ParamReader<'_>) -> Result<Self, InvalidParameterError> {
        let defaults = Self::default();
        Ok(Self {
            airflow_err_thres: reader.fraction("airflow_err_thres", defaults.airflow_err_thres)?,
            ahu_min_oa_cfm_design: reader
                .positive("ahu_min_oa_cfm_design", defaults.ahu_min_oa_cfm_design)?,
            oat_rat_delta_min: reader.non_negative("oat_rat_delta_min", defaults.oat_rat_delta_min)?,
            ahu_min_oa_dpr: reader.fraction("ahu_min_oa_dpr", defaults.ahu_min_oa_dpr)?,
        })
    }
}

impl ErvEfficiencyParams {
    pub(crate) fn read(reader: &ParamReader<'_>) -> Result<Self, InvalidParameterError> {
        let defaults = Self::default();
        let params = Self {
            min_heating: reader.fraction("erv_efficiency_min_heating", defaults.min_heating)?,
            max_heating: reader.fraction("erv_efficiency_max_heating", defaults.max_heating)?,
            min_cooling: reader.fraction("erv_efficiency_min_cooling", defaults.min_cooling)?,
            max_cooling: reader.fraction("erv_efficiency_max_cooling", defaults.max_cooling)?,
            oat_low_threshold: reader.number("oat_low_threshold", defaults.oat_low_threshold)?,
            oat_high_threshold: reader.number("oat_high_threshold", defaults.oat_high_threshold)?,
            oat_rat_delta_min: reader.non_negative("oat_rat_delta_min", defaults.oat_rat_delta_min)?,
        };

        reader.ordered(
            "erv_efficiency_min_heating",
            params.min_heating,
            "erv_efficiency_max_heating",
            params.max_heating,
        )?;
        reader.ordered(
            "erv_efficiency_min_cooling",
            params.min_cooling,
            "erv_efficiency_max_cooling",
            params.max_cooling,
        )?;
        reader.ordered(
            "oat_low_threshold",
            params.oat_low_threshold,
            "oat_high_threshold",
            params.oat_high_threshold,
        )?;
        Ok(params)
    }
}

impl ExpressionParams {
    pub(crate) fn read(
        reader: &ParamReader<'_>,
        expression: Option<&str>,
    ) -> Result<Self, InvalidParameterError> {
        let expression = match expression.map(str::trim) {
            Some(e) if !e.is_empty() => e.to_string(),
            _ => return Err(reader.invalid("expression", "expression rule has no formula")),
        };

        let constants = reader
            .params
            .iter()
            .filter_map(|(key, value)| match value {
                ParamValue::Number(v) => Some((key.clone(), *v)),
                ParamValue::Bool(b) => Some((key.clone(), if *b { 1.0 } else { 0.0 })),
                ParamValue::Text(_) => None,
            })
            .collect();

        Ok(Self {
            expression,
            constants,
        })
    }
}
