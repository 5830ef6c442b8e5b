//! Average Directional Index (ADX).
//!
//! Directional movement is Wilder-smoothed and normalized by ATR to the
//! +DI/−DI pair; DX = 100·|+DI − −DI| / (+DI + −DI); ADX is the Wilder
//! smoothing of DX.

use super::smooth::{true_range, wilder_smooth};

pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = high.len();
    let mut result = vec![f64::NAN; n];
    if n < 2 || period == 0 {
        return result;
    }

    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for i in 1..n {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        if up.is_nan() || down.is_nan() {
            continue;
        }
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let atr = wilder_smooth(&true_range(high, low, close), period);
    let plus_smooth = wilder_smooth(&plus_dm, period);
    let minus_smooth = wilder_smooth(&minus_dm, period);

    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        let a = atr[i];
        let p = plus_smooth[i];
        let m = minus_smooth[i];
        if a.is_nan() || p.is_nan() || m.is_nan() || a == 0.0 {
            continue;
        }
        let plus_di = 100.0 * p / a;
        let minus_di = 100.0 * m / a;
        let denom = plus_di + minus_di;
        if denom > 0.0 {
            dx[i] = 100.0 * (plus_di - minus_di).abs() / denom;
        }
    }

    let smoothed = wilder_smooth(&dx, period);
    result.copy_from_slice(&smoothed);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adx_strong_uptrend_is_high() {
        // Persistent up-moves: +DM dominates, DX → 100, ADX rises toward 100.
        let n = 60;
        let high: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        let low: Vec<f64> = (0..n).map(|i| 99.0 + i as f64).collect();
        let close: Vec<f64> = (0..n).map(|i| 99.5 + i as f64).collect();
        let result = adx(&high, &low, &close, 14);
        let last = result[n - 1];
        assert!(last > 80.0, "trending ADX should be high, got {last}");
    }

    #[test]
    fn adx_bounds() {
        let high = [10.0, 11.0, 10.5, 12.0, 11.5, 13.0, 12.0, 14.0, 13.0, 15.0];
        let low = [9.0, 10.0, 9.5, 11.0, 10.5, 12.0, 11.0, 13.0, 12.0, 14.0];
        let close = [9.5, 10.5, 10.0, 11.5, 11.0, 12.5, 11.5, 13.5, 12.5, 14.5];
        for v in adx(&high, &low, &close, 3) {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v));
            }
        }
    }

    #[test]
    fn adx_warmup_is_nan() {
        let n = 20;
        let high: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        let low: Vec<f64> = (0..n).map(|i| 99.0 + i as f64).collect();
        let close: Vec<f64> = (0..n).map(|i| 99.5 + i as f64).collect();
        let result = adx(&high, &low, &close, 14);
        // DX itself needs 14 observations of smoothed DI, then ADX needs 14 more.
        assert!(result[..14].iter().all(|v| v.is_nan()));
    }
}
