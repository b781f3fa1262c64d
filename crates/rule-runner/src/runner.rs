//! Rule Runner
//!
//! A run resolves every rule, evaluates the resolved rules (optionally on the
//! rayon pool), then writes one flag column per evaluated rule onto a copy of
//! the input table. Rules never see each other's flags.

use crate::resolver::resolve;
use crate::{MissingColumnError, RunError};
use checks::Mask;
use metrics::{counter, histogram};
use rayon::prelude::*;
use rule_model::{
    CheckParams, ColumnMap, LoadOptions, Params, ResolvedColumns, Rule, RuleLoadError, RuleSet,
    UnitSystem,
};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use timeseries::{sustained, Table};
use tracing::{debug, info, warn};

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Loaded,
    Resolving,
    Evaluating,
    Complete,
    Failed,
}

impl RunState {
    /// Whether `next` may follow this state
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Loaded, Resolving)
                | (Resolving, Evaluating)
                | (Evaluating, Complete)
                | (Loaded | Resolving | Evaluating, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed)
    }
}

struct StateTracker {
    state: RunState,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            state: RunState::Loaded,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid run transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, error: RunError) -> RunError {
        self.advance(RunState::Failed);
        error
    }
}

/// Invocation parameters of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub units: UnitSystem,
    /// Abort on the first failing rule; otherwise record it and continue
    pub strict: bool,
    /// Skip, rather than fail, rules with unresolved required inputs
    pub skip_missing_columns: bool,
    /// Debounce window for rules that declare none
    pub rolling_window: Option<usize>,
    /// Evaluate rules on the rayon pool
    pub parallel: bool,
    /// Params merged over every rule's own params
    pub params: Params,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            units: UnitSystem::Imperial,
            strict: true,
            skip_missing_columns: false,
            rolling_window: None,
            parallel: false,
            params: Params::new(),
        }
    }
}

/// Cooperative cancellation shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleOutcome {
    /// Flag column written
    Evaluated { flagged_rows: usize },
    /// Required columns missing and skipping was requested
    Skipped { missing: Vec<String> },
    /// Failed in lenient mode; no flag column was written
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleReport {
    pub rule: String,
    pub flag: String,
    pub outcome: RuleOutcome,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Input table plus one flag column per evaluated rule
    pub table: Table,
    /// One entry per rule, in rule order
    pub rules: Vec<RuleReport>,
    pub state: RunState,
}

impl RunReport {
    /// Rules that produced no flag column, with the reason
    pub fn not_evaluated(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules
            .iter()
            .filter(|r| !matches!(r.outcome, RuleOutcome::Evaluated { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Failed { .. }))
    }

    /// Flag columns written by this run
    pub fn flag_names(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Evaluated { .. }))
            .map(|r| r.flag.as_str())
            .collect()
    }
}

/// A rule ready for evaluation
struct Planned<'a> {
    index: usize,
    rule: &'a Rule,
    columns: ResolvedColumns,
    params: CheckParams,
    window: Option<usize>,
}

/// Runs a rule set over sensor tables
#[derive(Debug, Clone)]
pub struct RuleRunner {
    rules: RuleSet,
    load_options: LoadOptions,
}

impl RuleRunner {
    pub fn new(rules: RuleSet) -> Self {
        info!("Creating rule runner with {} rules", rules.len());
        Self {
            rules,
            load_options: LoadOptions::default(),
        }
    }

    pub fn from_rules(rules: Vec<Rule>, options: LoadOptions) -> Result<Self, RuleLoadError> {
        Ok(Self {
            rules: RuleSet::from_rules(rules, &options)?,
            load_options: options,
        })
    }

    pub fn from_dir(dir: impl AsRef<Path>, options: LoadOptions) -> Result<Self, RuleLoadError> {
        Ok(Self {
            rules: RuleSet::from_dir(dir, &options)?,
            load_options: options,
        })
    }

    /// Add a rule; the extended set is validated as a whole
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), RuleLoadError> {
        let mut rules = self.rules.rules().to_vec();
        rules.push(rule);
        self.rules = RuleSet::from_rules(rules, &self.load_options)?;
        Ok(())
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn run(
        &self,
        table: &Table,
        column_map: &ColumnMap,
        options: &RunOptions,
    ) -> Result<RunReport, RunError> {
        self.run_with_cancel(table, column_map, options, &CancelToken::new())
    }

    /// Run, checking `cancel` between rules. A cancelled run returns
    /// [`RunError::Cancelled`] and no table.
    pub fn run_with_cancel(
        &self,
        table: &Table,
        column_map: &ColumnMap,
        options: &RunOptions,
        cancel: &CancelToken,
    ) -> Result<RunReport, RunError> {
        let mut tracker = StateTracker::new();
        let mut outcomes: Vec<Option<RuleOutcome>> = vec![None; self.rules.len()];

        tracker.advance(RunState::Resolving);
        let mut planned = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(tracker.fail(RunError::Cancelled));
            }
            match self.plan(index, rule, table, column_map, options) {
                Ok(plan) => planned.push(plan),
                Err(RunError::Missing(missing)) if options.skip_missing_columns => {
                    warn!(
                        "Skipping rule '{}': no column for {:?}",
                        rule.name(),
                        missing.roles
                    );
                    counter!("fdd_rules_skipped_total").increment(1);
                    outcomes[index] = Some(RuleOutcome::Skipped {
                        missing: missing.roles,
                    });
                }
                Err(error) => {
                    outcomes[index] = Some(record_failure(rule, error, options, &mut tracker)?);
                }
            }
        }

        tracker.advance(RunState::Evaluating);
        let evaluate = |plan: &Planned<'_>| -> Option<Result<Mask, RunError>> {
            if cancel.is_cancelled() {
                return None;
            }
            Some(evaluate_rule(plan, table))
        };
        let results: Vec<Option<Result<Mask, RunError>>> = if options.parallel {
            planned.par_iter().map(evaluate).collect()
        } else {
            let mut results = Vec::with_capacity(planned.len());
            for plan in &planned {
                let result = evaluate(plan);
                let stop = result.is_none() || (options.strict && matches!(result, Some(Err(_))));
                results.push(result);
                if stop {
                    break;
                }
            }
            results
        };
        if cancel.is_cancelled() || results.iter().any(Option::is_none) {
            return Err(tracker.fail(RunError::Cancelled));
        }

        let mut output = table.clone();
        for (plan, result) in planned.iter().zip(results.into_iter().flatten()) {
            let written = result.and_then(|mask| {
                let flagged_rows = mask.iter().filter(|&&f| f).count();
                output
                    .set_flag(plan.rule.flag_name(), mask)
                    .map_err(|source| RunError::Table {
                        flag: plan.rule.flag_name().to_string(),
                        source,
                    })?;
                Ok(flagged_rows)
            });

            outcomes[plan.index] = Some(match written {
                Ok(flagged_rows) => {
                    counter!("fdd_rules_evaluated_total").increment(1);
                    debug!(
                        "Rule '{}' flagged {} rows",
                        plan.rule.name(),
                        flagged_rows
                    );
                    RuleOutcome::Evaluated { flagged_rows }
                }
                Err(error) => record_failure(plan.rule, error, options, &mut tracker)?,
            });
        }

        tracker.advance(RunState::Complete);
        let rules = self
            .rules
            .iter()
            .zip(outcomes)
            .map(|(rule, outcome)| RuleReport {
                rule: rule.name().to_string(),
                flag: rule.flag_name().to_string(),
                outcome: outcome.unwrap_or(RuleOutcome::Failed {
                    error: "not evaluated".to_string(),
                }),
            })
            .collect::<Vec<_>>();

        info!(
            "Run complete: {} of {} rules evaluated over {} rows",
            rules
                .iter()
                .filter(|r| matches!(r.outcome, RuleOutcome::Evaluated { .. }))
                .count(),
            rules.len(),
            table.len()
        );
        Ok(RunReport {
            table: output,
            rules,
            state: tracker.state,
        })
    }

    fn plan<'a>(
        &self,
        index: usize,
        rule: &'a Rule,
        table: &Table,
        column_map: &ColumnMap,
        options: &RunOptions,
    ) -> Result<Planned<'a>, RunError> {
        let resolution = resolve(rule, column_map, table);
        if !resolution.is_complete() {
            return Err(MissingColumnError {
                rule: rule.name().to_string(),
                roles: resolution.missing_required,
            }
            .into());
        }

        Ok(Planned {
            index,
            rule,
            columns: resolution.columns,
            params: rule.check_params(options.units, &options.params)?,
            window: rule.rolling_window_size().or(options.rolling_window),
        })
    }
}

fn evaluate_rule(plan: &Planned<'_>, table: &Table) -> Result<Mask, RunError> {
    let started = Instant::now();
    let raw = checks::evaluate(&plan.params, table, &plan.columns).map_err(|source| {
        RunError::Evaluation {
            rule: plan.rule.name().to_string(),
            source,
        }
    })?;
    let mask = match plan.window {
        Some(window) => sustained(&raw, window),
        None => raw,
    };
    histogram!("fdd_rule_eval_seconds").record(started.elapsed().as_secs_f64());
    Ok(mask)
}

/// Strict mode aborts with the error; lenient mode records it
fn record_failure(
    rule: &Rule,
    error: RunError,
    options: &RunOptions,
    tracker: &mut StateTracker,
) -> Result<RuleOutcome, RunError> {
    counter!("fdd_rules_failed_total").increment(1);
    if options.strict {
        return Err(tracker.fail(error));
    }
    warn!("Rule '{}' failed, continuing: {}", rule.name(), error);
    Ok(RuleOutcome::Failed {
        error: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rule_model::{Bounds, CheckType, InputSpec};

    fn bounds_rule() -> Rule {
        Rule::builder("sat_bounds", CheckType::Bounds)
            .input(InputSpec::new("sat").bounds(Bounds::PerUnit {
                imperial: Some([40.0, 60.0]),
                metric: Some([4.0, 16.0]),
            }))
            .build()
            .unwrap()
    }

    fn flatline_rule() -> Rule {
        Rule::builder("sat_flat", CheckType::Flatline)
            .input(InputSpec::new("sat"))
            .param("tolerance", 0.001)
            .param("window", 3.0)
            .build()
            .unwrap()
    }

    fn runner(rules: Vec<Rule>) -> RuleRunner {
        RuleRunner::from_rules(rules, LoadOptions::default()).unwrap()
    }

    fn sat_table(values: Vec<f64>) -> Table {
        Table::new().with_column("sat", values).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        assert!(RunState::Loaded.can_transition_to(RunState::Resolving));
        assert!(RunState::Evaluating.can_transition_to(RunState::Failed));
        assert!(!RunState::Loaded.can_transition_to(RunState::Complete));
        assert!(!RunState::Complete.can_transition_to(RunState::Failed));
        assert!(RunState::Failed.is_terminal());
    }

    #[test]
    fn test_run_writes_flags() {
        let report = runner(vec![bounds_rule(), flatline_rule()])
            .run(&sat_table(vec![30.0, 50.0, 70.0]), &ColumnMap::new(), &RunOptions::default())
            .unwrap();

        assert_eq!(report.state, RunState::Complete);
        assert_eq!(
            report.table.flags("sat_bounds_flag").unwrap().as_ref(),
            &[true, false, true]
        );
        assert_eq!(report.flag_names(), vec!["sat_bounds_flag", "sat_flat_flag"]);
        assert_eq!(report.table.numeric("sat").unwrap().as_ref(), &[30.0, 50.0, 70.0]);
    }

    #[test]
    fn test_units_select_bounds() {
        let options = RunOptions {
            units: UnitSystem::Metric,
            ..Default::default()
        };
        let report = runner(vec![bounds_rule()])
            .run(&sat_table(vec![3.0, 10.0, 20.0]), &ColumnMap::new(), &options)
            .unwrap();
        assert_eq!(
            report.table.flags("sat_bounds_flag").unwrap().as_ref(),
            &[true, false, true]
        );
    }

    #[test]
    fn test_column_map_applies() {
        let table = Table::new().with_column("SAT (°F)", vec![30.0]).unwrap();
        let map = ColumnMap::new().with("sat", "SAT (°F)");
        let report = runner(vec![bounds_rule()])
            .run(&table, &map, &RunOptions::default())
            .unwrap();
        assert_eq!(report.table.flags("sat_bounds_flag").unwrap().as_ref(), &[true]);
    }

    #[test]
    fn test_missing_column_strict_aborts() {
        let table = Table::new().with_column("rat", vec![1.0]).unwrap();
        let err = runner(vec![bounds_rule()])
            .run(&table, &ColumnMap::new(), &RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, RunError::Missing(ref m) if m.roles == vec!["sat".to_string()]));
    }

    #[test]
    fn test_missing_column_skipped() {
        let rat_rule = Rule::builder("rat_bounds", CheckType::Bounds)
            .input(InputSpec::new("rat").bounds(Bounds::Range([60.0, 80.0])))
            .build()
            .unwrap();
        let options = RunOptions {
            skip_missing_columns: true,
            ..Default::default()
        };
        let report = runner(vec![bounds_rule(), rat_rule])
            .run(&sat_table(vec![50.0]), &ColumnMap::new(), &options)
            .unwrap();

        assert_eq!(report.flag_names(), vec!["sat_bounds_flag"]);
        assert!(!report.table.contains("rat_bounds_flag"));
        let skipped: Vec<_> = report.not_evaluated().map(|r| r.rule.as_str()).collect();
        assert_eq!(skipped, vec!["rat_bounds"]);
    }

    #[test]
    fn test_lenient_records_failures() {
        let broken = Rule::builder("broken", CheckType::Expression)
            .input(InputSpec::new("sat"))
            .expression("sat > undefined_threshold")
            .build()
            .unwrap();
        let table = sat_table(vec![30.0, 50.0, 70.0]);

        let err = runner(vec![broken.clone(), bounds_rule()])
            .run(&table, &ColumnMap::new(), &RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, RunError::Evaluation { ref rule, .. } if rule == "broken"));

        let lenient = RunOptions {
            strict: false,
            ..Default::default()
        };
        let report = runner(vec![broken, bounds_rule()])
            .run(&table, &ColumnMap::new(), &lenient)
            .unwrap();
        assert_eq!(report.flag_names(), vec!["sat_bounds_flag"]);
        let failures: Vec<_> = report.failures().map(|r| r.rule.as_str()).collect();
        assert_eq!(failures, vec!["broken"]);
    }

    #[test]
    fn test_flag_cannot_overwrite_data() {
        let rule = Rule::builder("clash", CheckType::Bounds)
            .flag("sat")
            .input(InputSpec::new("sat").bounds(Bounds::Range([0.0, 1.0])))
            .build()
            .unwrap();
        let err = runner(vec![rule])
            .run(&sat_table(vec![0.5]), &ColumnMap::new(), &RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, RunError::Table { .. }));
    }

    #[test]
    fn test_rule_window_debounces() {
        let rule = Rule::builder("sat_high", CheckType::Bounds)
            .input(InputSpec::new("sat").bounds(Bounds::Range([0.0, 10.0])))
            .rolling_window_size(3)
            .build()
            .unwrap();
        let table = sat_table(vec![20.0, 20.0, 5.0, 20.0, 20.0, 20.0, 20.0]);
        let report = runner(vec![rule])
            .run(&table, &ColumnMap::new(), &RunOptions::default())
            .unwrap();
        assert_eq!(
            report.table.flags("sat_high_flag").unwrap().as_ref(),
            &[false, false, false, false, false, true, true]
        );
    }

    #[test]
    fn test_run_params_override_rule_params() {
        let options = RunOptions {
            params: [("tolerance".to_string(), 0.0.into())].into_iter().collect(),
            ..Default::default()
        };
        let report = runner(vec![flatline_rule()])
            .run(&sat_table(vec![5.0; 4]), &ColumnMap::new(), &options)
            .unwrap();
        // a zero tolerance never flags: spread 0 is not below 0
        assert!(report.table.flags("sat_flat_flag").unwrap().iter().all(|&f| !f));
    }

    #[test]
    fn test_cancelled_run_returns_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = runner(vec![bounds_rule()]).run_with_cancel(
            &sat_table(vec![50.0]),
            &ColumnMap::new(),
            &RunOptions::default(),
            &cancel,
        );
        assert!(matches!(result, Err(RunError::Cancelled)));
    }

    #[test]
    fn test_add_rule_rejects_duplicate_flag() {
        let mut runner = runner(vec![bounds_rule()]);
        let dup = Rule::builder("other", CheckType::Flatline)
            .flag("sat_bounds_flag")
            .input(InputSpec::new("sat"))
            .build()
            .unwrap();
        assert!(matches!(
            runner.add_rule(dup),
            Err(RuleLoadError::DuplicateFlag { .. })
        ));
        assert_eq!(runner.rules().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_runs_are_idempotent(
            values in prop::collection::vec(prop_oneof![Just(f64::NAN), 0.0f64..100.0], 1..200),
            parallel in any::<bool>(),
        ) {
            let runner = runner(vec![bounds_rule(), flatline_rule()]);
            let options = RunOptions { parallel, ..Default::default() };
            let table = sat_table(values);

            let first = runner.run(&table, &ColumnMap::new(), &options).unwrap();
            let second = runner.run(&first.table, &ColumnMap::new(), &options).unwrap();
            for flag in ["sat_bounds_flag", "sat_flat_flag"] {
                prop_assert_eq!(first.table.flags(flag).unwrap(), second.table.flags(flag).unwrap());
            }
        }

        #[test]
        fn prop_debounce_matches_window(
            values in prop::collection::vec(0.0f64..100.0, 1..150),
            window in 1usize..8,
        ) {
            let raw_rule = Rule::builder("raw", CheckType::Bounds)
                .input(InputSpec::new("sat").bounds(Bounds::Range([20.0, 80.0])))
                .build()
                .unwrap();
            let debounced_rule = Rule::builder("debounced", CheckType::Bounds)
                .input(InputSpec::new("sat").bounds(Bounds::Range([20.0, 80.0])))
                .rolling_window_size(window)
                .build()
                .unwrap();
            let report = runner(vec![raw_rule, debounced_rule])
                .run(&sat_table(values), &ColumnMap::new(), &RunOptions::default())
                .unwrap();

            let raw = report.table.flags("raw_flag").unwrap();
            let debounced = report.table.flags("debounced_flag").unwrap();
            for i in 0..raw.len() {
                let expected = i + 1 >= window && raw[i + 1 - window..=i].iter().all(|&f| f);
                prop_assert_eq!(debounced[i], expected);
            }
        }
    }
}
