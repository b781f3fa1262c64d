//! Fault Episodes
//!
//! An episode is one maximal run of consecutive true rows in a flag column.

use crate::AnalyticsError;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use timeseries::Table;
use tracing::debug;

/// One contiguous run of a flag being true
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub flag_name: String,
    /// First flagged row
    pub start_row: usize,
    /// Last flagged row, inclusive
    pub end_row: usize,
    /// Timestamp of `start_row`, when the table is time-indexed
    pub start_ts: Option<DateTime<Utc>>,
    /// Timestamp of `end_row`, when the table is time-indexed
    pub end_ts: Option<DateTime<Utc>>,
    pub row_count: usize,
    /// Sensors that violated their own criterion within the episode
    pub contributing_sensors: Vec<String>,
    /// Every evaluated sensor is implicated (device offline)
    pub all_sensors_implicated: bool,
    /// Exactly one sensor is implicated
    pub single_sensor_implicated: bool,
    /// Mean of each implicated sensor within the episode (bounds only)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sensor_means: BTreeMap<String, f64>,
}

impl Episode {
    fn new(
        flag_name: &str,
        start_row: usize,
        end_row: usize,
        timestamps: Option<&[DateTime<Utc>]>,
    ) -> Self {
        Self {
            flag_name: flag_name.to_string(),
            start_row,
            end_row,
            start_ts: timestamps.and_then(|ts| ts.get(start_row).copied()),
            end_ts: timestamps.and_then(|ts| ts.get(end_row).copied()),
            row_count: end_row + 1 - start_row,
            contributing_sensors: Vec::new(),
            all_sensors_implicated: false,
            single_sensor_implicated: false,
            sensor_means: BTreeMap::new(),
        }
    }

    /// Row positions covered by the episode
    pub fn rows(&self) -> RangeInclusive<usize> {
        self.start_row..=self.end_row
    }
}

/// Maximal true runs of `flags`, in row order.
///
/// Runs touching the first or last row are closed at the observed boundary.
pub fn extract_episodes(
    flag_name: &str,
    flags: &[bool],
    timestamps: Option<&[DateTime<Utc>]>,
) -> Vec<Episode> {
    let mut episodes = Vec::new();
    let mut start = None;

    for (row, &flag) in flags.iter().enumerate() {
        match (flag, start) {
            (true, None) => start = Some(row),
            (false, Some(first)) => {
                episodes.push(Episode::new(flag_name, first, row - 1, timestamps));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(first) = start {
        episodes.push(Episode::new(flag_name, first, flags.len() - 1, timestamps));
    }

    debug!("Flag '{}': {} episodes", flag_name, episodes.len());
    episodes
}

/// Episodes of one flag column of a table
pub fn episodes_for(table: &Table, flag: &str) -> Result<Vec<Episode>, AnalyticsError> {
    let flags = table.flags(flag)?;
    Ok(extract_episodes(flag, &flags, table.timestamps()))
}

/// Episodes of several flag columns, extracted in parallel
pub fn extract_all_episodes(
    table: &Table,
    flags: &[&str],
) -> Result<BTreeMap<String, Vec<Episode>>, AnalyticsError> {
    flags
        .par_iter()
        .map(|flag| Ok((flag.to_string(), episodes_for(table, flag)?)))
        .collect()
}
