//! Fault Analytics
//!
//! Reduces flag columns to discrete episodes, attributes bounds and flatline
//! episodes to the sensors responsible, and summarizes time in fault.

mod attribution;
mod episodes;
mod error;
mod ranges;
mod summary;

pub use attribution::{
    analyze_bounds_episodes, analyze_episodes, analyze_flatline_episodes, attribute_sensors,
    bounds_map_from_rule, Attribution, BoundsMap, Criterion,
};
pub use episodes::{episodes_for, extract_all_episodes, extract_episodes, Episode};
pub use error::AnalyticsError;
pub use ranges::{
    flatline_period, flatline_period_range, sensor_cols_from_column_map, time_range,
    TIMESTAMP_FORMAT,
};
pub use summary::{
    summarize_all_faults, summarize_fault, FaultPeriod, FaultSummary, SummaryOptions,
    MOTOR_ON_THRESHOLD,
};

use std::collections::BTreeMap;

/// `{label: column}` of the sensors to examine, ordered by label
pub type SensorColumns = BTreeMap<String, String>;
