//! Synthetic OHLCV series for tests and benches.
//!
//! All generators are deterministic: the random walk takes an explicit seed,
//! the shaped series are pure functions of their parameters.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use candela_core::domain::CandleSeries;

const HOUR_MS: i64 = 3_600_000;

/// Flat series: 100/101/99/100, constant volume.
pub fn flat_series(n: usize) -> CandleSeries {
    CandleSeries::from_columns(
        (0..n as i64).map(|i| i * HOUR_MS).collect(),
        vec![100.0; n],
        vec![101.0; n],
        vec![99.0; n],
        vec![100.0; n],
        vec![1_000.0; n],
    )
    .expect("flat series is well-formed")
}

/// Flat series with an upside breakout at `at`: the bar spikes to a high of
/// 115 closing at 112, and the series continues at the new level.
pub fn breakout_series(n: usize, at: usize) -> CandleSeries {
    assert!(at < n, "breakout index out of range");
    let mut open = vec![100.0; n];
    let mut high = vec![101.0; n];
    let mut low = vec![99.0; n];
    let mut close = vec![100.0; n];

    open[at] = 100.0;
    high[at] = 115.0;
    low[at] = 99.0;
    close[at] = 112.0;
    for i in (at + 1)..n {
        open[i] = 112.0;
        high[i] = 113.0;
        low[i] = 111.0;
        close[i] = 112.0;
    }

    CandleSeries::from_columns(
        (0..n as i64).map(|i| i * HOUR_MS).collect(),
        open,
        high,
        low,
        close,
        vec![1_000.0; n],
    )
    .expect("breakout series is well-formed")
}

/// Mirror of [`breakout_series`]: a breakdown to 85 closing at 88.
pub fn breakdown_series(n: usize, at: usize) -> CandleSeries {
    assert!(at < n, "breakdown index out of range");
    let mut open = vec![100.0; n];
    let mut high = vec![101.0; n];
    let mut low = vec![99.0; n];
    let mut close = vec![100.0; n];

    open[at] = 100.0;
    low[at] = 85.0;
    close[at] = 88.0;
    for i in (at + 1)..n {
        open[i] = 88.0;
        high[i] = 89.0;
        low[i] = 87.0;
        close[i] = 88.0;
    }

    CandleSeries::from_columns(
        (0..n as i64).map(|i| i * HOUR_MS).collect(),
        open,
        high,
        low,
        close,
        vec![1_000.0; n],
    )
    .expect("breakdown series is well-formed")
}

/// Seeded geometric random walk with intrabar range, starting at 100.
pub fn random_walk(n: usize, seed: u64) -> CandleSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut open_time = Vec::with_capacity(n);
    let mut open = Vec::with_capacity(n);
    let mut high = Vec::with_capacity(n);
    let mut low = Vec::with_capacity(n);
    let mut close = Vec::with_capacity(n);
    let mut volume = Vec::with_capacity(n);

    let mut price = 100.0_f64;
    for i in 0..n {
        let drift: f64 = rng.gen_range(-0.01..0.011);
        let bar_open = price;
        let bar_close = (price * (1.0 + drift)).max(0.01);
        let range: f64 = rng.gen_range(0.001..0.02);
        let bar_high = bar_open.max(bar_close) * (1.0 + range / 2.0);
        let bar_low = bar_open.min(bar_close) * (1.0 - range / 2.0);

        open_time.push(i as i64 * HOUR_MS);
        open.push(bar_open);
        high.push(bar_high);
        low.push(bar_low);
        close.push(bar_close);
        volume.push(rng.gen_range(500.0..5_000.0));

        price = bar_close;
    }

    CandleSeries::from_columns(open_time, open, high, low, close, volume)
        .expect("random walk is well-formed")
}

/// Monotonic ramp climbing `step` per bar with a fixed intrabar range; used
/// by walk-forward leakage tests. A negative `step` descends.
pub fn ramp_series(n: usize, start: f64, step: f64) -> CandleSeries {
    let mut open_time = Vec::with_capacity(n);
    let mut open = Vec::with_capacity(n);
    let mut high = Vec::with_capacity(n);
    let mut low = Vec::with_capacity(n);
    let mut close = Vec::with_capacity(n);

    for i in 0..n {
        let level = start + step * i as f64;
        open_time.push(i as i64 * HOUR_MS);
        open.push(level);
        high.push(level + level.abs() * 0.002);
        low.push(level - level.abs() * 0.002);
        close.push(level + step * 0.5);
    }

    CandleSeries::from_columns(open_time, open, high, low, close, vec![1_000.0; n])
        .expect("ramp series is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_walk_is_seed_deterministic() {
        assert_eq!(random_walk(200, 9), random_walk(200, 9));
        assert_ne!(random_walk(200, 9), random_walk(200, 10));
    }

    #[test]
    fn bars_are_sane() {
        let series = random_walk(500, 3);
        for i in 0..series.len() {
            assert!(series.bar(i).is_sane(), "insane bar at {i}");
        }
    }

    #[test]
    fn breakout_series_shape() {
        let series = breakout_series(50, 30);
        assert_eq!(series.high[30], 115.0);
        assert_eq!(series.close[49], 112.0);
        assert_eq!(series.close[29], 100.0);
    }

    #[test]
    fn ramp_climbs() {
        let series = ramp_series(10, 100.0, 1.0);
        assert!(series.close[9] > series.close[0]);
        let falling = ramp_series(10, 100.0, -1.0);
        assert!(falling.close[9] < falling.close[0]);
    }
}
