//! True Range and Wilder smoothing.
//!
//! Wilder smoothing (RMA) is an exponentially weighted mean with
//! alpha = 1/period, seeded at the first observation, that withholds output
//! until `period` observations have been seen.

/// Compute the True Range series.
///
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = high.len();
    let mut tr = vec![f64::NAN; n];
    if n == 0 {
        return tr;
    }

    if !high[0].is_nan() && !low[0].is_nan() {
        tr[0] = high[0] - low[0];
    }

    for i in 1..n {
        let h = high[i];
        let l = low[i];
        let pc = close[i - 1];
        if h.is_nan() || l.is_nan() {
            continue;
        }
        tr[i] = if pc.is_nan() {
            h - l
        } else {
            (h - l).max((h - pc).abs()).max((l - pc).abs())
        };
    }

    tr
}

/// Wilder smoothing: recursive EMA with alpha = 1/period.
///
/// The recursion starts at the first non-NaN value (seeded with that value);
/// output stays NaN until `period` observations have entered the recursion.
/// A NaN after the seed is carried through (the previous smoothed value is
/// reused), matching min-periods exponential-mean semantics.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if n == 0 || period == 0 {
        return result;
    }

    let alpha = 1.0 / period as f64;
    let mut state: Option<f64> = None;
    let mut observed = 0usize;

    for i in 0..n {
        let v = values[i];
        if v.is_nan() {
            continue;
        }
        observed += 1;
        let next = match state {
            None => v,
            Some(prev) => alpha * v + (1.0 - alpha) * prev,
        };
        state = Some(next);
        if observed >= period {
            result[i] = next;
        }
    }

    result
}

/// ATR: Wilder-smoothed True Range.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    wilder_smooth(&true_range(high, low, close), period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let high = [105.0, 108.0, 107.0];
        let low = [95.0, 100.0, 98.0];
        let close = [102.0, 106.0, 99.0];
        let tr = true_range(&high, &low, &close);
        // TR[0] = 105-95 = 10
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        // TR[1] = max(8, |108-102|, |100-102|) = 8
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        // TR[2] = max(9, |107-106|, |98-106|) = 9
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        // Gap up: prev close 100, current bar 115-108
        let high = [102.0, 115.0];
        let low = [97.0, 108.0];
        let close = [100.0, 112.0];
        let tr = true_range(&high, &low, &close);
        assert_approx(tr[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_smooth_recursion() {
        let values = [10.0, 8.0, 9.0, 6.0, 6.0];
        let smoothed = wilder_smooth(&values, 3);
        // Warmup: NaN until 3 observations.
        assert!(smoothed[0].is_nan());
        assert!(smoothed[1].is_nan());
        // Recursion from value[0]:
        // s0 = 10
        // s1 = 8/3 + 2/3*10 = 28/3
        // s2 = 9/3 + 2/3*28/3 = 3 + 56/9 = 83/9
        assert_approx(smoothed[2], 83.0 / 9.0, DEFAULT_EPSILON);
        // s3 = 6/3 + 2/3*83/9 = 2 + 166/27 = 220/27
        assert_approx(smoothed[3], 220.0 / 27.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_smooth_leading_nan() {
        let values = [f64::NAN, 4.0, 4.0, 4.0];
        let smoothed = wilder_smooth(&values, 2);
        assert!(smoothed[0].is_nan());
        assert!(smoothed[1].is_nan());
        assert_approx(smoothed[2], 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_constant_range_converges() {
        // Every TR = 2 → ATR = 2 once warm.
        let n = 40;
        let high: Vec<f64> = vec![101.0; n];
        let low: Vec<f64> = vec![99.0; n];
        let close: Vec<f64> = vec![100.0; n];
        let result = atr(&high, &low, &close, 14);
        assert!(result[12].is_nan());
        assert_approx(result[13], 2.0, DEFAULT_EPSILON);
        assert_approx(result[n - 1], 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn empty_input() {
        assert!(wilder_smooth(&[], 14).is_empty());
        assert!(true_range(&[], &[], &[]).is_empty());
    }
}
