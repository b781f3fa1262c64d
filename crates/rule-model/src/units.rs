//! Unit Systems and Bounds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Engineering unit system used to pick bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Imperial,
    Metric,
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Imperial => write!(f, "imperial"),
            UnitSystem::Metric => write!(f, "metric"),
        }
    }
}

impl std::str::FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "imperial" => Ok(UnitSystem::Imperial),
            "metric" => Ok(UnitSystem::Metric),
            other => Err(format!("unknown unit system '{other}'")),
        }
    }
}

/// Scale of a command signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitScale {
    /// Values are already 0.0-1.0
    #[default]
    Fraction,
    /// Values are 0-100 and are divided by 100
    Percent,
    /// Divide by 100 when any sample exceeds 1.0
    Auto,
}

impl UnitScale {
    /// Normalize a command signal to a 0.0-1.0 fraction
    pub fn normalize(self, values: &[f64]) -> Vec<f64> {
        let percent = match self {
            UnitScale::Fraction => false,
            UnitScale::Percent => true,
            UnitScale::Auto => values.iter().any(|&v| v > 1.0),
        };
        if percent {
            values.iter().map(|v| v / 100.0).collect()
        } else {
            values.to_vec()
        }
    }
}

/// Acceptable `[low, high]` range, either shared or split per unit system.
///
/// ```yaml
/// bounds: [40, 150]
/// bounds: { imperial: [40, 150], metric: [4, 66] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bounds {
    Range([f64; 2]),
    PerUnit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        imperial: Option<[f64; 2]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metric: Option<[f64; 2]>,
    },
}

impl Bounds {
    /// Range for the given unit system; `None` when only the other system is declared
    pub fn for_units(&self, units: UnitSystem) -> Option<(f64, f64)> {
        let range = match (self, units) {
            (Bounds::Range(range), _) => Some(range),
            (Bounds::PerUnit { imperial, .. }, UnitSystem::Imperial) => imperial.as_ref(),
            (Bounds::PerUnit { metric, .. }, UnitSystem::Metric) => metric.as_ref(),
        };
        range.map(|[lo, hi]| (*lo, *hi))
    }

    /// Every declared range
    pub(crate) fn ranges(&self) -> Vec<[f64; 2]> {
        match self {
            Bounds::Range(range) => vec![*range],
            Bounds::PerUnit { imperial, metric } => {
                imperial.iter().chain(metric.iter()).copied().collect()
            }
        }
    }
}
