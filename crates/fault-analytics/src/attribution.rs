//! Sensor Attribution
//!
//! A combined bounds or flatline rule flags when any of its sensors violates
//! its criterion. Attribution re-examines each sensor within an episode's rows
//! to find which ones did.

use crate::episodes::{episodes_for, Episode};
use crate::summary::round2;
use crate::{AnalyticsError, SensorColumns};
use rule_model::{Rule, RuleLoadError, UnitSystem};
use std::collections::BTreeMap;
use timeseries::Table;

/// `{label: (low, high)}` per sensor
pub type BoundsMap = BTreeMap<String, (f64, f64)>;

/// Per-sensor test applied within an episode
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Any finite value outside its sensor's `(low, high)`
    Bounds(BoundsMap),
    /// Spread of the finite values below `tolerance` (needs two samples)
    Flatline { tolerance: f64 },
}

/// Sensors implicated in one episode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attribution {
    pub sensors: Vec<String>,
    /// Sensors the criterion could be applied to
    pub evaluated: usize,
    /// Mean of each implicated sensor (bounds only)
    pub means: BTreeMap<String, f64>,
}

impl Attribution {
    pub fn all_implicated(&self) -> bool {
        self.evaluated > 0 && self.sensors.len() == self.evaluated
    }

    pub fn single_implicated(&self) -> bool {
        self.sensors.len() == 1
    }
}

/// Which of `sensor_cols` violated `criterion` within the episode.
///
/// Sensors absent from the table are ignored. For bounds, every sensor with
/// bounds counts as evaluated; for flatline, only sensors with at least two
/// finite samples in the episode do.
pub fn attribute_sensors(
    table: &Table,
    episode: &Episode,
    sensor_cols: &SensorColumns,
    criterion: &Criterion,
) -> Result<Attribution, AnalyticsError> {
    let mut attribution = Attribution::default();
    if let Criterion::Bounds(bounds) = criterion {
        attribution.evaluated = sensor_cols
            .keys()
            .filter(|label| bounds.contains_key(*label))
            .count();
    }

    for (label, column) in sensor_cols {
        if !table.contains(column) {
            continue;
        }
        let values = table.numeric(column)?;
        let window: Vec<f64> = values
            .get(episode.rows())
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();

        match criterion {
            Criterion::Bounds(bounds) => {
                let Some(&(low, high)) = bounds.get(label) else {
                    continue;
                };
                if window.iter().any(|&v| v < low || v > high) {
                    let mean = window.iter().sum::<f64>() / window.len() as f64;
                    attribution.sensors.push(label.clone());
                    attribution.means.insert(label.clone(), round2(mean));
                }
            }
            Criterion::Flatline { tolerance } => {
                if window.len() < 2 {
                    continue;
                }
                attribution.evaluated += 1;
                let max = window.iter().copied().fold(f64::MIN, f64::max);
                let min = window.iter().copied().fold(f64::MAX, f64::min);
                if max - min < *tolerance {
                    attribution.sensors.push(label.clone());
                }
            }
        }
    }

    Ok(attribution)
}

/// Episodes of `flag`, each attributed against `criterion`
pub fn analyze_episodes(
    table: &Table,
    flag: &str,
    sensor_cols: &SensorColumns,
    criterion: &Criterion,
) -> Result<Vec<Episode>, AnalyticsError> {
    let mut episodes = episodes_for(table, flag)?;
    for episode in &mut episodes {
        let attribution = attribute_sensors(table, episode, sensor_cols, criterion)?;
        episode.all_sensors_implicated = attribution.all_implicated();
        episode.single_sensor_implicated = attribution.single_implicated();
        episode.contributing_sensors = attribution.sensors;
        episode.sensor_means = attribution.means;
    }
    Ok(episodes)
}

/// Bounds-violation episodes with the out-of-range sensors of each
pub fn analyze_bounds_episodes(
    table: &Table,
    flag: &str,
    sensor_cols: &SensorColumns,
    bounds: &BoundsMap,
) -> Result<Vec<Episode>, AnalyticsError> {
    analyze_episodes(table, flag, sensor_cols, &Criterion::Bounds(bounds.clone()))
}

/// Flatline episodes with the flat sensors of each
pub fn analyze_flatline_episodes(
    table: &Table,
    flag: &str,
    sensor_cols: &SensorColumns,
    tolerance: f64,
) -> Result<Vec<Episode>, AnalyticsError> {
    analyze_episodes(table, flag, sensor_cols, &Criterion::Flatline { tolerance })
}

/// Bounds of a rule keyed by BRICK class (or input key), for attribution
pub fn bounds_map_from_rule(rule: &Rule, units: UnitSystem) -> Result<BoundsMap, RuleLoadError> {
    Ok(rule
        .bounds_for(units)?
        .into_iter()
        .map(|b| (b.label, (b.low, b.high)))
        .collect())
}
