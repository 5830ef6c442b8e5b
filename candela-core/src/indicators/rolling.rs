//! Rolling window kernels: extrema, mean, sample standard deviation.
//!
//! All kernels require a full window (min-periods = window) before producing
//! a value; earlier positions are NaN.

/// Rolling maximum over `window` values ending at each index.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling_extremum(values, window, true)
}

/// Rolling minimum over `window` values ending at each index.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling_extremum(values, window, false)
}

fn rolling_extremum(values: &[f64], window: usize, max: bool) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }

    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        let mut acc = if max {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        let mut has_nan = false;
        for &v in slice {
            if v.is_nan() {
                has_nan = true;
                break;
            }
            acc = if max { acc.max(v) } else { acc.min(v) };
        }
        if !has_nan {
            result[i] = acc;
        }
    }

    result
}

/// Rolling arithmetic mean over `window` values ending at each index.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }

    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = slice.iter().sum::<f64>() / window as f64;
    }

    result
}

/// Rolling sample standard deviation (ddof = 1) over `window` values.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window < 2 || n < window {
        return result;
    }

    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let variance =
            slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
        result[i] = variance.sqrt();
    }

    result
}

/// Mean of the trailing `window` values ending at `idx`, shrinking the window
/// at the start of the series instead of returning NaN.
pub fn trailing_mean(values: &[f64], idx: usize, window: usize) -> f64 {
    if values.is_empty() || idx >= values.len() || window == 0 {
        return f64::NAN;
    }
    let start = (idx + 1).saturating_sub(window);
    let slice = &values[start..=idx];
    if slice.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    slice.iter().sum::<f64>() / slice.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn rolling_max_window_3() {
        let values = [12.0, 15.0, 14.0, 16.0, 15.5];
        let result = rolling_max(&values, 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 15.0, DEFAULT_EPSILON);
        assert_approx(result[3], 16.0, DEFAULT_EPSILON);
        assert_approx(result[4], 16.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_min_window_3() {
        let values = [9.0, 10.0, 13.0, 12.0, 14.0];
        let result = rolling_min(&values, 3);
        assert_approx(result[2], 9.0, DEFAULT_EPSILON);
        assert_approx(result[3], 10.0, DEFAULT_EPSILON);
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_std_known_values() {
        // Window [2, 4, 6]: mean 4, sample variance (4+0+4)/2 = 4, std 2
        let values = [2.0, 4.0, 6.0];
        let result = rolling_std(&values, 3);
        assert_approx(result[2], 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_std_constant_is_zero() {
        let values = [5.0; 10];
        let result = rolling_std(&values, 4);
        assert_approx(result[9], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_in_window_propagates() {
        let values = [1.0, f64::NAN, 3.0, 4.0, 5.0];
        assert!(rolling_max(&values, 3)[2].is_nan());
        assert!(rolling_mean(&values, 3)[3].is_nan());
        // Window [3, 4, 5] is clean again.
        assert_approx(rolling_mean(&values, 3)[4], 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn trailing_mean_shrinks_at_start() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_approx(trailing_mean(&values, 0, 3), 10.0, DEFAULT_EPSILON);
        assert_approx(trailing_mean(&values, 1, 3), 15.0, DEFAULT_EPSILON);
        assert_approx(trailing_mean(&values, 3, 3), 30.0, DEFAULT_EPSILON);
    }

    #[test]
    fn short_series_all_nan() {
        let result = rolling_std(&[1.0, 2.0], 5);
        assert!(result.iter().all(|v| v.is_nan()));
    }
}
