//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! Edge cases: avg_loss == 0 → 100; avg_gain == 0 → 0; no movement → 50.

use super::smooth::wilder_smooth;

pub fn rsi(close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut result = vec![f64::NAN; n];
    if n < 2 || period == 0 {
        return result;
    }

    let mut gains = vec![f64::NAN; n];
    let mut losses = vec![f64::NAN; n];
    for i in 1..n {
        let curr = close[i];
        let prev = close[i - 1];
        if curr.is_nan() || prev.is_nan() {
            continue;
        }
        let change = curr - prev;
        gains[i] = change.max(0.0);
        losses[i] = (-change).max(0.0);
    }

    let avg_gain = wilder_smooth(&gains, period);
    let avg_loss = wilder_smooth(&losses, period);

    for i in 0..n {
        let g = avg_gain[i];
        let l = avg_loss[i];
        if g.is_nan() || l.is_nan() {
            continue;
        }
        result[i] = if l == 0.0 && g == 0.0 {
            50.0 // no movement
        } else if l == 0.0 {
            100.0
        } else if g == 0.0 {
            0.0
        } else {
            100.0 - 100.0 / (1.0 + g / l)
        };
    }

    result
}
