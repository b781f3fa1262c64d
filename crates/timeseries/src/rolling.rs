//! Rolling Window Primitives
//!
//! Every window here is trailing: the value at row `i` covers rows
//! `[i + 1 - window, i]`. Rows without a full window of history read as NaN
//! (numeric outputs) or false (boolean outputs).

use std::collections::VecDeque;

/// Trailing sum over `window` samples.
///
/// A window containing NaN sums to NaN.
pub fn rolling_sum(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;

    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            nan_count += 1;
        } else {
            sum += value;
        }

        if i >= window {
            let leaving = values[i - window];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }

        if i + 1 >= window && nan_count == 0 {
            out[i] = sum;
        }
    }

    out
}

/// Trailing spread (max - min) over `window` samples.
///
/// Uses monotonic queues so the cost is linear in the series length. A
/// window containing NaN has NaN spread.
pub fn rolling_spread(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }

    // Indices of candidate maxima (decreasing values) and minima (increasing values)
    let mut maxima: VecDeque<usize> = VecDeque::with_capacity(window);
    let mut minima: VecDeque<usize> = VecDeque::with_capacity(window);
    let mut nan_count = 0usize;

    for (i, &value) in values.iter().enumerate() {
        if i >= window && values[i - window].is_nan() {
            nan_count -= 1;
        }

        let oldest = (i + 1).saturating_sub(window);
        while maxima.front().is_some_and(|&j| j < oldest) {
            maxima.pop_front();
        }
        while minima.front().is_some_and(|&j| j < oldest) {
            minima.pop_front();
        }

        if value.is_nan() {
            nan_count += 1;
        } else {
            while maxima.back().is_some_and(|&j| values[j] <= value) {
                maxima.pop_back();
            }
            maxima.push_back(i);
            while minima.back().is_some_and(|&j| values[j] >= value) {
                minima.pop_back();
            }
            minima.push_back(i);
        }

        if i + 1 >= window && nan_count == 0 {
            if let (Some(&hi), Some(&lo)) = (maxima.front(), minima.front()) {
                out[i] = values[hi] - values[lo];
            }
        }
    }

    out
}

/// Absolute change from the previous sample; the first row is 0.
///
/// A change involving NaN reads as 0.
pub fn absolute_changes(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for (i, &value) in values.iter().enumerate() {
        let change = if i == 0 {
            0.0
        } else {
            (value - values[i - 1]).abs()
        };
        out.push(if change.is_nan() { 0.0 } else { change });
    }
    out
}

/// Debounce: true at row `i` only when `mask` holds for all of the last
/// `window` rows.
///
/// Equivalent to a trailing sliding sum of the mask being equal to `window`.
/// A window of 0 or 1 returns the mask unchanged.
pub fn sustained(mask: &[bool], window: usize) -> Vec<bool> {
    if window <= 1 {
        return mask.to_vec();
    }

    let mut run = 0usize;
    mask.iter()
        .map(|&flag| {
            run = if flag { run + 1 } else { 0 };
            run >= window
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rolling_sum_warm_up() {
        let sums = rolling_sum(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(sums[0].is_nan());
        assert!(sums[1].is_nan());
        assert_eq!(sums[2], 6.0);
        assert_eq!(sums[3], 9.0);
    }

    #[test]
    fn test_rolling_sum_nan_window() {
        let sums = rolling_sum(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2);
        assert!(sums[1].is_nan());
        assert!(sums[2].is_nan());
        assert_eq!(sums[3], 7.0);
        assert_eq!(sums[4], 9.0);
    }

    #[test]
    fn test_rolling_spread_constant() {
        let spread = rolling_spread(&[5.0; 5], 3);
        assert!(spread[0].is_nan());
        assert!(spread[1].is_nan());
        assert_eq!(&spread[2..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rolling_spread_values() {
        let spread = rolling_spread(&[1.0, 4.0, 2.0, 2.0, 9.0], 3);
        assert_eq!(spread[2], 3.0);
        assert_eq!(spread[3], 2.0);
        assert_eq!(spread[4], 7.0);
    }

    #[test]
    fn test_rolling_spread_skips_nan_windows() {
        let spread = rolling_spread(&[1.0, f64::NAN, 1.0, 1.0, 1.0], 2);
        assert!(spread[1].is_nan());
        assert!(spread[2].is_nan());
        assert_eq!(spread[3], 0.0);
        assert_eq!(spread[4], 0.0);
    }

    #[test]
    fn test_absolute_changes() {
        let changes = absolute_changes(&[1.0, 3.0, 2.0, f64::NAN, 2.0]);
        assert_eq!(changes, vec![0.0, 2.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sustained_requires_full_run() {
        let mask = [true, true, false, true, true, true, true];
        assert_eq!(
            sustained(&mask, 3),
            vec![false, false, false, false, false, true, true]
        );
        assert_eq!(sustained(&mask, 1), mask.to_vec());
    }

    proptest! {
        #[test]
        fn prop_sustained_matches_window_all(mask in prop::collection::vec(any::<bool>(), 0..200), window in 1usize..12) {
            let debounced = sustained(&mask, window);
            for i in 0..mask.len() {
                let expected = i + 1 >= window && mask[i + 1 - window..=i].iter().all(|&v| v);
                prop_assert_eq!(debounced[i], expected);
            }
        }

        #[test]
        fn prop_spread_matches_naive(values in prop::collection::vec(-50.0f64..50.0, 0..120), window in 1usize..10) {
            let spread = rolling_spread(&values, window);
            for i in 0..values.len() {
                if i + 1 < window {
                    prop_assert!(spread[i].is_nan());
                } else {
                    let slice = &values[i + 1 - window..=i];
                    let hi = slice.iter().cloned().fold(f64::MIN, f64::max);
                    let lo = slice.iter().cloned().fold(f64::MAX, f64::min);
                    prop_assert!((spread[i] - (hi - lo)).abs() < 1e-9);
                }
            }
        }
    }
}
