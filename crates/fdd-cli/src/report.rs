//! Run output: per-rule outcomes plus episodes and fault summaries

use anyhow::Result;
use fault_analytics::{
    analyze_bounds_episodes, analyze_flatline_episodes, bounds_map_from_rule, episodes_for,
    summarize_all_faults, Episode, FaultSummary, SensorColumns,
};
use rule_model::{CheckParams, CheckType, ColumnMap, Rule, RuleSet};
use rule_runner::{candidate_column, RuleReport, RunOptions, RunReport};
use serde::Serialize;
use std::collections::BTreeMap;
use timeseries::Table;

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub rules: Vec<RuleReport>,
    /// Present when the table is time-indexed
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub summaries: BTreeMap<String, FaultSummary>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub episodes: BTreeMap<String, Vec<Episode>>,
}

/// `{label: column}` of a rule's inputs present in the table
pub fn sensor_columns(rule: &Rule, map: &ColumnMap, table: &Table) -> SensorColumns {
    rule.inputs()
        .iter()
        .map(|input| (input.label().to_string(), candidate_column(input, map)))
        .filter(|(_, column)| table.contains(column))
        .collect()
}

/// Episodes of one evaluated rule, attributed for bounds and flatline checks
pub fn rule_episodes(
    rule: &Rule,
    table: &Table,
    map: &ColumnMap,
    options: &RunOptions,
) -> Result<Vec<Episode>> {
    let flag = rule.flag_name();
    let sensors = sensor_columns(rule, map, table);

    let episodes = match rule.check_type() {
        CheckType::Bounds => {
            let bounds = bounds_map_from_rule(rule, options.units)?;
            analyze_bounds_episodes(table, flag, &sensors, &bounds)?
        }
        CheckType::Flatline => match rule.check_params(options.units, &options.params)? {
            CheckParams::Flatline(params) => {
                analyze_flatline_episodes(table, flag, &sensors, params.tolerance)?
            }
            _ => episodes_for(table, flag)?,
        },
        _ => episodes_for(table, flag)?,
    };

    Ok(episodes)
}

pub fn build_output(
    rules: &RuleSet,
    report: RunReport,
    map: &ColumnMap,
    options: &RunOptions,
    motor_col: Option<&str>,
    with_episodes: bool,
) -> Result<RunOutput> {
    let table = &report.table;
    let evaluated: Vec<&Rule> = report
        .flag_names()
        .into_iter()
        .filter_map(|flag| rules.iter().find(|r| r.flag_name() == flag))
        .collect();

    let summaries = if table.timestamps().is_some() {
        let flags: Vec<&str> = evaluated.iter().map(|r| r.flag_name()).collect();
        let sensor_map: BTreeMap<String, SensorColumns> = evaluated
            .iter()
            .map(|r| (r.flag_name().to_string(), sensor_columns(r, map, table)))
            .collect();
        summarize_all_faults(table, Some(flags.as_slice()), motor_col, &sensor_map)?
    } else {
        BTreeMap::new()
    };

    let mut episodes = BTreeMap::new();
    if with_episodes {
        for rule in &evaluated {
            episodes.insert(
                rule.flag_name().to_string(),
                rule_episodes(rule, table, map, options)?,
            );
        }
    }

    Ok(RunOutput {
        rules: report.rules,
        summaries,
        episodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rule_model::{Bounds, InputSpec, LoadOptions, UnitSystem};
    use rule_runner::RuleRunner;

    fn bounds_rule() -> Rule {
        Rule::builder("bad_sensor", CheckType::Bounds)
            .input(
                InputSpec::new("sat")
                    .brick("Supply_Air_Temperature_Sensor")
                    .bounds(Bounds::Range([40.0, 150.0])),
            )
            .input(
                InputSpec::new("oat")
                    .brick("Outside_Air_Temperature_Sensor")
                    .bounds(Bounds::Range([-60.0, 130.0])),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_bundled_rules_load() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../rules");
        for units in [UnitSystem::Imperial, UnitSystem::Metric] {
            let runner = RuleRunner::from_dir(dir, LoadOptions { units }).unwrap();
            assert_eq!(runner.rules().len(), 6);
            assert!(runner.rules().get("sensor_bounds").is_some());
        }
    }

    #[test]
    fn test_sensor_columns_follow_column_map() {
        let table = Table::new()
            .with_column("SAT (°F)", vec![55.0])
            .unwrap()
            .with_column("oat", vec![50.0])
            .unwrap();
        let map = ColumnMap::new().with("Supply_Air_Temperature_Sensor", "SAT (°F)");
        let sensors = sensor_columns(&bounds_rule(), &map, &table);
        assert_eq!(sensors["Supply_Air_Temperature_Sensor"], "SAT (°F)");
        // the oat input falls back to its literal column
        assert_eq!(sensors["Outside_Air_Temperature_Sensor"], "oat");
    }

    #[test]
    fn test_build_output_attributes_bounds_episodes() {
        let table = Table::new()
            .with_column("sat", vec![55.0, 200.0, 55.0])
            .unwrap()
            .with_column("oat", vec![50.0, 50.0, 50.0])
            .unwrap();
        let runner = RuleRunner::from_rules(vec![bounds_rule()], LoadOptions::default()).unwrap();
        let options = RunOptions::default();
        let report = runner.run(&table, &ColumnMap::new(), &options).unwrap();

        let output =
            build_output(runner.rules(), report, &ColumnMap::new(), &options, None, true).unwrap();
        assert!(output.summaries.is_empty());
        let episodes = &output.episodes["bad_sensor_flag"];
        assert_eq!(episodes.len(), 1);
        assert_eq!(
            episodes[0].contributing_sensors,
            vec!["Supply_Air_Temperature_Sensor"]
        );
    }
}
