//! Signal Roles
//!
//! Physical checks look their signals up among the rule inputs by BRICK
//! class or by a short alias.

use crate::EvaluationError;
use rule_model::{ResolvedColumns, ResolvedInput, UnitScale};
use timeseries::Table;

/// A named signal: BRICK class plus alias
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    pub brick: &'static str,
    pub alias: &'static str,
}

impl Role {
    const fn new(brick: &'static str, alias: &'static str) -> Self {
        Self { brick, alias }
    }

    fn names(&self) -> [&'static str; 2] {
        [self.brick, self.alias]
    }

    /// The rule input carrying this signal, if declared and resolved
    pub fn find<'a>(&self, columns: &'a ResolvedColumns) -> Option<&'a ResolvedInput> {
        columns.find(&self.names())
    }
}

pub const DAMPER_COMMAND: Role = Role::new("Damper_Position_Command", "economizer_sig");
pub const SUPPLY_FAN_SPEED: Role = Role::new("Supply_Fan_Speed_Command", "supply_vfd_speed");
pub const HEATING_COMMAND: Role = Role::new("Heating_Valve_Command", "heating_sig");
pub const COOLING_COMMAND: Role = Role::new("Cooling_Valve_Command", "cooling_sig");

pub const RETURN_AIR_TEMP: Role = Role::new("Return_Air_Temperature_Sensor", "rat");
pub const OUTSIDE_AIR_TEMP: Role = Role::new("Outside_Air_Temperature_Sensor", "oat");
pub const MIXED_AIR_TEMP: Role = Role::new("Mixed_Air_Temperature_Sensor", "mat");
pub const SUPPLY_FAN_AIRFLOW: Role = Role::new("Supply_Fan_Air_Flow_Sensor", "supply_fan_air_volume");

pub const ERV_OAT_ENTER: Role = Role::new("ERV_Outside_Air_Temperature_Sensor", "erv_oat_enter");
pub const ERV_OAT_LEAVING: Role =
    Role::new("ERV_Discharge_Air_Temperature_Sensor", "erv_oat_leaving");
pub const ERV_EAT_ENTER: Role = Role::new("ERV_Return_Air_Temperature_Sensor", "erv_eat_enter");

/// Read a resolved input as numbers, applying its unit scale
pub(crate) fn read_input(
    table: &Table,
    input: &ResolvedInput,
    default_scale: UnitScale,
) -> Result<Vec<f64>, EvaluationError> {
    let values = table.numeric(&input.column)?;
    Ok(input.spec.unit_scale.unwrap_or(default_scale).normalize(&values))
}

/// Read an optional signal
pub(crate) fn read_role(
    table: &Table,
    columns: &ResolvedColumns,
    role: Role,
    default_scale: UnitScale,
) -> Result<Option<Vec<f64>>, EvaluationError> {
    role.find(columns)
        .map(|input| read_input(table, input, default_scale))
        .transpose()
}

/// Read signals a check cannot run without; reports every absent role at once
pub(crate) fn require_roles<const N: usize>(
    check: &'static str,
    table: &Table,
    columns: &ResolvedColumns,
    roles: [Role; N],
) -> Result<[Vec<f64>; N], EvaluationError> {
    let missing: Vec<String> = roles
        .iter()
        .filter(|role| role.find(columns).is_none())
        .map(|role| role.brick.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(EvaluationError::MissingRole {
            check,
            roles: missing,
        });
    }

    let mut out: [Vec<f64>; N] = std::array::from_fn(|_| Vec::new());
    for (slot, role) in out.iter_mut().zip(roles) {
        if let Some(values) = read_role(table, columns, role, UnitScale::Fraction)? {
            *slot = values;
        }
    }
    Ok(out)
}
