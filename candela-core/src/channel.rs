//! Channel-breakout indicator.
//!
//! Per bar:
//! - `high_channel` = highest high over `i1` bars, `low_channel` = lowest low
//! - `mid_channel` = channel midpoint
//! - `atr` = Wilder-smoothed true range, fixed period 14
//! - `stdev` = rolling sample stddev of close over `i2` bars
//! - `long_trigger  = mid·(1 + i5/100) + atr·i4 + stdev·i3`
//! - `short_trigger = mid·(1 − i5/100) − atr·i4 − stdev·i3`
//!
//! Pure function of the series and the preset; no state.

use serde::{Deserialize, Serialize};

use crate::domain::CandleSeries;
use crate::error::CoreError;
use crate::indicators::{rolling_max, rolling_min, rolling_std, smooth};
use crate::presets::Preset;

/// Fixed ATR period, as in the published indicator.
pub const ATR_PERIOD: usize = 14;

/// Per-bar indicator columns, aligned with the input series. Warmup
/// positions are NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSeries {
    pub high_channel: Vec<f64>,
    pub low_channel: Vec<f64>,
    pub mid_channel: Vec<f64>,
    pub atr: Vec<f64>,
    pub stdev: Vec<f64>,
    pub long_trigger: Vec<f64>,
    pub short_trigger: Vec<f64>,
}

impl ChannelSeries {
    pub fn len(&self) -> usize {
        self.long_trigger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.long_trigger.is_empty()
    }

    /// True when both triggers have values at `i`.
    pub fn is_ready(&self, i: usize) -> bool {
        !self.long_trigger[i].is_nan() && !self.short_trigger[i].is_nan()
    }

    /// Channel width at `i`.
    pub fn channel_width(&self, i: usize) -> f64 {
        self.high_channel[i] - self.low_channel[i]
    }
}

/// The indicator: a preset applied to a candle series.
#[derive(Debug, Clone, Copy)]
pub struct ChannelIndicator {
    preset: Preset,
}

impl ChannelIndicator {
    pub fn new(preset: Preset) -> Self {
        Self { preset }
    }

    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    /// Compute the indicator over the whole series.
    ///
    /// Fails with `InsufficientData` when the series is shorter than
    /// `max(i1, i2, 14)`.
    pub fn compute(&self, series: &CandleSeries) -> Result<ChannelSeries, CoreError> {
        let need = self.preset.min_bars();
        if series.len() < need {
            return Err(CoreError::InsufficientData {
                have: series.len(),
                need,
            });
        }

        let p = &self.preset;
        let n = series.len();

        let high_channel = rolling_max(&series.high, p.i1);
        let low_channel = rolling_min(&series.low, p.i1);
        let atr = smooth::atr(&series.high, &series.low, &series.close, ATR_PERIOD);
        let stdev = rolling_std(&series.close, p.i2);

        let mut mid_channel = vec![f64::NAN; n];
        let mut long_trigger = vec![f64::NAN; n];
        let mut short_trigger = vec![f64::NAN; n];

        for i in 0..n {
            let hc = high_channel[i];
            let lc = low_channel[i];
            if hc.is_nan() || lc.is_nan() {
                continue;
            }
            let mid = (hc + lc) / 2.0;
            mid_channel[i] = mid;

            let a = atr[i];
            let s = stdev[i];
            if a.is_nan() || s.is_nan() {
                continue;
            }
            let offset = a * p.i4 + s * p.i3;
            long_trigger[i] = mid * (1.0 + p.i5 / 100.0) + offset;
            short_trigger[i] = mid * (1.0 - p.i5 / 100.0) - offset;
        }

        Ok(ChannelSeries {
            high_channel,
            low_channel,
            mid_channel,
            atr,
            stdev,
            long_trigger,
            short_trigger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use crate::presets::Preset;

    fn flat_series(n: usize) -> CandleSeries {
        CandleSeries::from_columns(
            (0..n as i64).map(|i| i * 3_600_000).collect(),
            vec![100.0; n],
            vec![101.0; n],
            vec![99.0; n],
            vec![100.0; n],
            vec![1_000.0; n],
        )
        .unwrap()
    }

    fn small_preset() -> Preset {
        Preset::custom(0, 5, 4, 1.0, 1.0, 1.0).unwrap()
    }

    #[test]
    fn insufficient_data_is_typed() {
        let series = flat_series(10);
        let indicator = ChannelIndicator::new(*Preset::by_index(0).unwrap()); // i1 = 40
        match indicator.compute(&series) {
            Err(CoreError::InsufficientData { have: 10, need: 40 }) => {}
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn flat_market_triggers() {
        // Flat series: channel 99..101, mid 100, ATR 2, stdev 0.
        let series = flat_series(40);
        let indicator = ChannelIndicator::new(small_preset());
        let out = indicator.compute(&series).unwrap();

        let i = 20;
        assert_approx(out.high_channel[i], 101.0, DEFAULT_EPSILON);
        assert_approx(out.low_channel[i], 99.0, DEFAULT_EPSILON);
        assert_approx(out.mid_channel[i], 100.0, DEFAULT_EPSILON);
        assert_approx(out.atr[i], 2.0, DEFAULT_EPSILON);
        assert_approx(out.stdev[i], 0.0, DEFAULT_EPSILON);
        // long = 100·1.01 + 2·1 + 0 = 103, short = 100·0.99 − 2 = 97
        assert_approx(out.long_trigger[i], 103.0, DEFAULT_EPSILON);
        assert_approx(out.short_trigger[i], 97.0, DEFAULT_EPSILON);
    }

    #[test]
    fn warmup_positions_are_nan() {
        let series = flat_series(40);
        let indicator = ChannelIndicator::new(small_preset());
        let out = indicator.compute(&series).unwrap();
        // ATR period 14 dominates the warmup for this preset.
        assert!(!out.is_ready(12));
        assert!(out.is_ready(13));
    }

    #[test]
    fn triggers_are_symmetric_around_offset_mid() {
        let series = flat_series(60);
        let preset = Preset::custom(3, 8, 6, 0.5, 2.0, 2.0).unwrap();
        let out = ChannelIndicator::new(preset).compute(&series).unwrap();
        let i = 30;
        let mid = out.mid_channel[i];
        let up = out.long_trigger[i] - mid * (1.0 + 0.02);
        let down = mid * (1.0 - 0.02) - out.short_trigger[i];
        assert_approx(up, down, DEFAULT_EPSILON);
    }

    #[test]
    fn deterministic_recompute() {
        let series = flat_series(50);
        let indicator = ChannelIndicator::new(small_preset());
        let a = indicator.compute(&series).unwrap();
        let b = indicator.compute(&series).unwrap();
        for i in 0..series.len() {
            let (x, y) = (a.long_trigger[i], b.long_trigger[i]);
            assert!(x.is_nan() == y.is_nan());
            if !x.is_nan() {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }
}
