//! Signal filters — volume, RSI, ADX, session window.
//!
//! Each enabled filter is one `FilterSpec` variant; the engine dispatches
//! once per bar through the spec array. Thresholds are either fixed or
//! adaptive: `Adaptive { coeff }` recomputes the effective threshold from the
//! bar's ATR snapshot at check time.
//!
//! A filter whose input is unavailable (NaN warmup, missing column) passes,
//! so filters can only reject on evidence.

use chrono::{NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{CandleSeries, Direction};
use crate::indicators::{adx, rolling::trailing_mean, rsi};

/// Fixed threshold or ATR-adaptive threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterMode {
    Fixed,
    Adaptive { coeff: f64 },
}

impl FilterMode {
    /// ATR-relative adjustment for this mode: `(atr / close) * coeff`,
    /// zero when fixed or when the ATR snapshot is unavailable.
    fn adjustment(&self, atr: f64, close: f64) -> f64 {
        match self {
            FilterMode::Fixed => 0.0,
            FilterMode::Adaptive { coeff } => {
                if atr.is_nan() || close <= 0.0 {
                    0.0
                } else {
                    atr / close * coeff
                }
            }
        }
    }
}

/// One enabled filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// `volume > mean(volume, period) * multiplier`. Adaptive mode scales the
    /// multiplier by `1 + (atr/close)·coeff`.
    Volume {
        period: usize,
        multiplier: f64,
        mode: FilterMode,
    },
    /// Long: `rsi > long_level`; short: `rsi < short_level`. Adaptive mode
    /// widens the levels symmetrically by `(atr/close)·coeff`, clamped to
    /// [0, 100].
    Rsi {
        period: usize,
        long_level: f64,
        short_level: f64,
        mode: FilterMode,
    },
    /// `adx > level`. Adaptive mode shifts the level by `(atr/close)·coeff`.
    Adx {
        period: usize,
        level: f64,
        mode: FilterMode,
    },
    /// Bar wall-clock time (UTC) within `[start, end]`.
    Session { start: NaiveTime, end: NaiveTime },
}

impl FilterSpec {
    pub fn volume() -> Self {
        FilterSpec::Volume {
            period: 20,
            multiplier: 1.2,
            mode: FilterMode::Fixed,
        }
    }

    pub fn rsi() -> Self {
        FilterSpec::Rsi {
            period: 14,
            long_level: 50.0,
            short_level: 50.0,
            mode: FilterMode::Fixed,
        }
    }

    pub fn adx() -> Self {
        FilterSpec::Adx {
            period: 14,
            level: 25.0,
            mode: FilterMode::Fixed,
        }
    }

    /// Name used as the key in per-filter result maps.
    pub fn name(&self) -> &'static str {
        match self {
            FilterSpec::Volume { .. } => "volume",
            FilterSpec::Rsi { .. } => "rsi",
            FilterSpec::Adx { .. } => "adx",
            FilterSpec::Session { .. } => "session",
        }
    }
}

/// The set of enabled filters for a run. Empty means everything passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub specs: Vec<FilterSpec>,
}

impl FilterSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(specs: Vec<FilterSpec>) -> Self {
        Self { specs }
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Precompute the per-spec indicator columns the set needs.
    pub fn prepare(&self, series: &CandleSeries) -> FilterSeries {
        let columns = self
            .specs
            .iter()
            .map(|spec| match spec {
                FilterSpec::Rsi { period, .. } => Some(rsi(&series.close, *period)),
                FilterSpec::Adx { period, .. } => {
                    Some(adx(&series.high, &series.low, &series.close, *period))
                }
                FilterSpec::Volume { .. } | FilterSpec::Session { .. } => None,
            })
            .collect();
        FilterSeries { columns }
    }

    /// Evaluate every filter at bar `idx` for a candidate signal direction.
    ///
    /// `atr` is the indicator's ATR column (used by adaptive thresholds).
    /// Returns the per-filter verdicts; the signal is accepted iff all are
    /// true.
    pub fn evaluate(
        &self,
        data: &FilterSeries,
        series: &CandleSeries,
        atr: &[f64],
        idx: usize,
        direction: Direction,
    ) -> BTreeMap<String, bool> {
        let close = series.close[idx];
        let bar_atr = atr.get(idx).copied().unwrap_or(f64::NAN);
        let mut results = BTreeMap::new();

        for (spec, column) in self.specs.iter().zip(&data.columns) {
            let passed = match spec {
                FilterSpec::Volume {
                    period,
                    multiplier,
                    mode,
                } => {
                    let vol = series.volume[idx];
                    let mean = trailing_mean(&series.volume, idx, *period);
                    if vol.is_nan() || mean.is_nan() {
                        true
                    } else {
                        let effective = multiplier * (1.0 + mode.adjustment(bar_atr, close));
                        vol > mean * effective
                    }
                }
                FilterSpec::Rsi {
                    long_level,
                    short_level,
                    mode,
                    ..
                } => {
                    let value = column.as_ref().map_or(f64::NAN, |c| c[idx]);
                    if value.is_nan() {
                        true
                    } else {
                        let adj = mode.adjustment(bar_atr, close);
                        match direction {
                            Direction::Long => value > (long_level + adj).clamp(0.0, 100.0),
                            Direction::Short => value < (short_level - adj).clamp(0.0, 100.0),
                        }
                    }
                }
                FilterSpec::Adx { level, mode, .. } => {
                    let value = column.as_ref().map_or(f64::NAN, |c| c[idx]);
                    if value.is_nan() {
                        true
                    } else {
                        value > level + mode.adjustment(bar_atr, close)
                    }
                }
                FilterSpec::Session { start, end } => {
                    match Utc.timestamp_millis_opt(series.open_time[idx]).single() {
                        Some(ts) => {
                            let t = NaiveTime::from_hms_opt(ts.hour(), ts.minute(), ts.second())
                                .unwrap_or(*start);
                            *start <= t && t <= *end
                        }
                        None => true,
                    }
                }
            };
            results.insert(spec.name().to_string(), passed);
        }

        results
    }
}

/// Precomputed indicator columns, parallel to `FilterSet::specs`.
#[derive(Debug, Clone)]
pub struct FilterSeries {
    columns: Vec<Option<Vec<f64>>>,
}

impl FilterSeries {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }
}

/// True iff every filter verdict is positive.
pub fn all_passed(results: &BTreeMap<String, bool>) -> bool {
    results.values().all(|&v| v)
}
