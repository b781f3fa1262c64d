//! Fault Summaries
//!
//! Durations are the time delta between consecutive samples attributed to the
//! later row and weighted by the flag, so irregular sampling is accounted for.
//! Every reported figure is rounded to two decimals.

use crate::{AnalyticsError, SensorColumns};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use timeseries::Table;
use tracing::debug;

/// Motor speed above which the equipment counts as running
pub const MOTOR_ON_THRESHOLD: f64 = 0.01;

const SECS_PER_HOUR: f64 = 3600.0;
const SECS_PER_DAY: f64 = 86_400.0;

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Optional inputs of [`summarize_fault`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryOptions {
    /// `{label: column}` averaged over flagged rows (`flag_true_means`)
    pub sensor_cols: SensorColumns,
    /// Equipment speed/command column for motor runtime
    pub motor_col: Option<String>,
    /// Explicit fault period, e.g. from [`crate::flatline_period_range`]
    pub period_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Statistics over the fault period, from its start to its end
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: f64,
    pub hours: f64,
    /// Rows with timestamps within the period
    pub rows: usize,
    pub rows_flagged: usize,
    pub percent_true: f64,
}

/// Duty-cycle statistics of one flag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultSummary {
    pub flag: String,
    pub total_days: f64,
    pub total_hours: f64,
    pub hours_fault_mode: f64,
    /// Share of flagged rows
    pub percent_true: f64,
    pub percent_false: f64,
    /// Share of elapsed time flagged
    pub percent_hours_true: f64,
    pub hours_motor_runtime: Option<f64>,
    /// Mean of each sensor over flagged rows; `None` when nothing was flagged
    pub flag_true_means: BTreeMap<String, Option<f64>>,
    pub fault_period: Option<FaultPeriod>,
}

/// Seconds since the previous sample; the first row gets 0
fn sample_deltas(timestamps: &[DateTime<Utc>]) -> Vec<f64> {
    let mut deltas = Vec::with_capacity(timestamps.len());
    deltas.extend(timestamps.first().map(|_| 0.0));
    deltas.extend(
        timestamps
            .windows(2)
            .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0),
    );
    deltas
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Summarize one flag column of a time-indexed table
pub fn summarize_fault(
    table: &Table,
    flag: &str,
    options: &SummaryOptions,
) -> Result<FaultSummary, AnalyticsError> {
    let timestamps = table.require_timestamps()?;
    let flags = table.flags(flag)?;
    let deltas = sample_deltas(timestamps);

    let total_secs: f64 = deltas.iter().sum();
    let fault_secs: f64 = deltas
        .iter()
        .zip(flags.iter())
        .filter(|&(_, &f)| f)
        .map(|(d, _)| d)
        .sum();
    let total_hours = total_secs / SECS_PER_HOUR;
    let hours_fault = fault_secs / SECS_PER_HOUR;
    let flagged = flags.iter().filter(|&&f| f).count();
    let percent_true = percent(flagged, flags.len());

    let hours_motor_runtime = match options.motor_col.as_deref() {
        Some(motor) if table.contains(motor) => {
            let speed = table.numeric(motor)?;
            let running: f64 = deltas
                .iter()
                .zip(speed.iter())
                .filter(|&(_, &s)| s > MOTOR_ON_THRESHOLD)
                .map(|(d, _)| d)
                .sum();
            Some(round2(running / SECS_PER_HOUR))
        }
        _ => None,
    };

    let mut flag_true_means = BTreeMap::new();
    for (label, column) in &options.sensor_cols {
        if !table.contains(column) {
            continue;
        }
        let values = table.numeric(column)?;
        let during: Vec<f64> = values
            .iter()
            .zip(flags.iter())
            .filter(|&(v, &f)| f && v.is_finite())
            .map(|(&v, _)| v)
            .collect();
        let mean = (!during.is_empty())
            .then(|| round2(during.iter().sum::<f64>() / during.len() as f64));
        flag_true_means.insert(label.clone(), mean);
    }

    let fault_period = fault_period(timestamps, &flags, options.period_range);

    debug!(
        "Flag '{}': {:.2} of {:.2} hours in fault",
        flag, hours_fault, total_hours
    );
    Ok(FaultSummary {
        flag: flag.to_string(),
        total_days: round2(total_secs / SECS_PER_DAY),
        total_hours: round2(total_hours),
        hours_fault_mode: round2(hours_fault),
        percent_true: round2(percent_true),
        percent_false: round2(100.0 - percent_true),
        percent_hours_true: if total_hours > 0.0 {
            round2(100.0 * hours_fault / total_hours)
        } else {
            0.0
        },
        hours_motor_runtime,
        flag_true_means,
        fault_period,
    })
}

fn fault_period(
    timestamps: &[DateTime<Utc>],
    flags: &[bool],
    period_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Option<FaultPeriod> {
    let mut flagged_times = timestamps
        .iter()
        .zip(flags)
        .filter(|&(_, &f)| f)
        .map(|(ts, _)| *ts);
    let first = flagged_times.next()?;
    let last = flagged_times.last().unwrap_or(first);
    let (start, end) = period_range.unwrap_or((first, last));

    let (rows, rows_flagged) = timestamps
        .iter()
        .zip(flags)
        .filter(|(ts, _)| (start..=end).contains(*ts))
        .fold((0, 0), |(rows, hits), (_, &f)| (rows + 1, hits + usize::from(f)));
    let secs = (end - start).num_milliseconds() as f64 / 1000.0;

    Some(FaultPeriod {
        start,
        end,
        days: round2(secs / SECS_PER_DAY),
        hours: round2(secs / SECS_PER_HOUR),
        rows,
        rows_flagged,
        percent_true: round2(percent(rows_flagged, rows)),
    })
}

/// Summaries of several flags, computed in parallel.
///
/// With no explicit `flags`, every flag column of the table is summarized.
/// `sensor_map` gives the sensors averaged for each flag.
pub fn summarize_all_faults(
    table: &Table,
    flags: Option<&[&str]>,
    motor_col: Option<&str>,
    sensor_map: &BTreeMap<String, SensorColumns>,
) -> Result<BTreeMap<String, FaultSummary>, AnalyticsError> {
    let flags = match flags {
        Some(flags) => flags.to_vec(),
        None => table.flag_columns(),
    };

    flags
        .par_iter()
        .map(|flag| {
            let options = SummaryOptions {
                sensor_cols: sensor_map.get(*flag).cloned().unwrap_or_default(),
                motor_col: motor_col.map(str::to_string),
                period_range: None,
            };
            Ok((flag.to_string(), summarize_fault(table, flag, &options)?))
        })
        .collect()
}
