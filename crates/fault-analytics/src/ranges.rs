//! Time Range Helpers

use crate::{AnalyticsError, SensorColumns};
use chrono::{DateTime, Utc};
use rule_model::ColumnMap;
use timeseries::Table;

/// Timestamp format of the range strings
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn format_range(start: &DateTime<Utc>, end: &DateTime<Utc>) -> String {
    if start == end {
        format_ts(start)
    } else {
        format!("{} to {}", format_ts(start), format_ts(end))
    }
}

/// Observed first and last flagged row
fn flagged_bounds(flags: &[bool]) -> Option<(usize, usize)> {
    let first = flags.iter().position(|&f| f)?;
    let last = flags.iter().rposition(|&f| f)?;
    Some((first, last))
}

/// `"start to end"` of the flagged rows, or `"-"` when nothing is flagged
pub fn time_range(table: &Table, flag: &str) -> Result<String, AnalyticsError> {
    let timestamps = table.require_timestamps()?;
    let flags = table.flags(flag)?;
    Ok(match flagged_bounds(&flags) {
        Some((first, last)) => format_range(&timestamps[first], &timestamps[last]),
        None => "-".to_string(),
    })
}

/// Start and end of a flatline period.
///
/// A flatline flag first fires `window - 1` rows after the signal went flat,
/// so the start is backed up by that many rows when they exist; otherwise the
/// observed flagged range is returned.
pub fn flatline_period_range(
    table: &Table,
    flag: &str,
    window: usize,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AnalyticsError> {
    if window == 0 {
        return Err(AnalyticsError::InvalidWindow(window));
    }
    let timestamps = table.require_timestamps()?;
    let flags = table.flags(flag)?;
    let Some((first, last)) = flagged_bounds(&flags) else {
        return Ok(None);
    };

    let start = first.checked_sub(window - 1).unwrap_or(first);
    Ok(Some((timestamps[start], timestamps[last])))
}

/// [`flatline_period_range`] formatted like [`time_range`]
pub fn flatline_period(table: &Table, flag: &str, window: usize) -> Result<String, AnalyticsError> {
    Ok(match flatline_period_range(table, flag, window)? {
        Some((start, end)) => format_range(&start, &end),
        None => "-".to_string(),
    })
}

/// Sensor entries of a column map: keys naming a `Sensor` class
pub fn sensor_cols_from_column_map(map: &ColumnMap) -> SensorColumns {
    map.iter()
        .filter(|(key, _)| key.contains("Sensor"))
        .map(|(key, column)| (key.to_string(), column.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn table(flags: Vec<bool>) -> Table {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap();
        let ts = (0..flags.len() as i64)
            .map(|i| start + Duration::minutes(15 * i))
            .collect();
        Table::with_timestamps("timestamp", ts)
            .unwrap()
            .with_column("flatline_flag", flags)
            .unwrap()
    }

    #[test]
    fn test_time_range() {
        let t = table(vec![false, true, true, false, true, false]);
        assert_eq!(
            time_range(&t, "flatline_flag").unwrap(),
            "2025-01-01 03:15:00 to 2025-01-01 04:00:00"
        );
        assert_eq!(time_range(&table(vec![false; 3]), "flatline_flag").unwrap(), "-");
        assert_eq!(
            time_range(&table(vec![false, true]), "flatline_flag").unwrap(),
            "2025-01-01 03:15:00"
        );
    }

    #[test]
    fn test_flatline_period_backs_up_window() {
        let t = table(vec![false, false, false, true, true]);
        let (start, end) = flatline_period_range(&t, "flatline_flag", 3).unwrap().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 1, 3, 15, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 4, 0, 0).unwrap());
        assert_eq!(
            flatline_period(&t, "flatline_flag", 3).unwrap(),
            "2025-01-01 03:15:00 to 2025-01-01 04:00:00"
        );
    }

    #[test]
    fn test_flatline_period_near_start_uses_observed_range() {
        let t = table(vec![false, true, true]);
        let (start, _) = flatline_period_range(&t, "flatline_flag", 12).unwrap().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 1, 3, 15, 0).unwrap());
        assert_eq!(flatline_period_range(&table(vec![false]), "flatline_flag", 12).unwrap(), None);
        assert!(flatline_period_range(&t, "flatline_flag", 0).is_err());
    }

    #[test]
    fn test_sensor_cols_from_column_map() {
        let map = ColumnMap::new()
            .with("Supply_Air_Temperature_Sensor", "SAT (°F)")
            .with("Supply_Fan_Speed_Command", "SF Spd Cmd (%)")
            .with("oat", "OAT (°F)");
        let sensors = sensor_cols_from_column_map(&map);
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors["Supply_Air_Temperature_Sensor"], "SAT (°F)");
    }
}
