//! ATR-ratio volatility regime classification.
//!
//! Ratio = current ATR / rolling mean of ATR over a baseline window.
//! Regime: low below 0.7, high above 1.3, normal otherwise. Each regime
//! carries a recommended TP/SL multiplier pair.

use serde::{Deserialize, Serialize};

use crate::channel::ATR_PERIOD;
use crate::domain::CandleSeries;
use crate::indicators::{rolling_mean, smooth};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

impl VolatilityRegime {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.7 {
            VolatilityRegime::Low
        } else if ratio > 1.3 {
            VolatilityRegime::High
        } else {
            VolatilityRegime::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityRegime::Low => "low",
            VolatilityRegime::Normal => "normal",
            VolatilityRegime::High => "high",
        }
    }

    /// Recommended (TP multiplier, SL multiplier) pair for the regime.
    pub fn multipliers(&self) -> (f64, f64) {
        match self {
            VolatilityRegime::Low => (0.8, 0.8),
            VolatilityRegime::Normal => (1.0, 1.0),
            VolatilityRegime::High => (1.3, 1.2),
        }
    }
}

impl std::str::FromStr for VolatilityRegime {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(VolatilityRegime::Low),
            "normal" => Ok(VolatilityRegime::Normal),
            "high" => Ok(VolatilityRegime::High),
            other => Err(crate::error::CoreError::invalid(format!(
                "unknown volatility regime: {other:?}"
            ))),
        }
    }
}

/// Point-in-time classification output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityResult {
    pub regime: VolatilityRegime,
    pub current_atr: f64,
    pub average_atr: f64,
    pub atr_ratio: f64,
    /// Current ATR as a percentile of the observed ATR history (0..100).
    pub atr_percentile: f64,
    pub tp_multiplier: f64,
    pub sl_multiplier: f64,
}

/// Distribution of regimes over a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityStats {
    pub current: VolatilityResult,
    /// Percent of classified bars in each regime.
    pub low_percent: f64,
    pub normal_percent: f64,
    pub high_percent: f64,
    pub regime_changes: usize,
    pub avg_regime_duration_bars: f64,
}

/// The classifier: ATR period is fixed at 14, the baseline window is
/// configurable (default 100 bars).
#[derive(Debug, Clone, Copy)]
pub struct VolatilityClassifier {
    pub baseline_period: usize,
}

impl Default for VolatilityClassifier {
    fn default() -> Self {
        Self {
            baseline_period: 100,
        }
    }
}

impl VolatilityClassifier {
    pub fn new(baseline_period: usize) -> Self {
        Self { baseline_period }
    }

    fn atr_series(&self, series: &CandleSeries) -> Vec<f64> {
        smooth::atr(&series.high, &series.low, &series.close, ATR_PERIOD)
    }

    /// Regime for the last bar. With fewer than baseline-period bars of ATR
    /// history the regime defaults to normal.
    pub fn regime(&self, series: &CandleSeries) -> VolatilityRegime {
        self.classify(series).regime
    }

    /// Full classification for the last bar.
    pub fn classify(&self, series: &CandleSeries) -> VolatilityResult {
        let atr = self.atr_series(series);
        let baseline = rolling_mean(&atr, self.baseline_period);

        let current_atr = atr.last().copied().unwrap_or(f64::NAN);
        let average_atr = baseline.last().copied().unwrap_or(f64::NAN);

        let atr_ratio = if average_atr.is_nan() || average_atr == 0.0 || current_atr.is_nan() {
            1.0
        } else {
            current_atr / average_atr
        };

        let observed: Vec<f64> = atr.iter().copied().filter(|v| !v.is_nan()).collect();
        let atr_percentile = if observed.is_empty() || current_atr.is_nan() {
            0.0
        } else {
            let below = observed.iter().filter(|&&v| v < current_atr).count();
            below as f64 / observed.len() as f64 * 100.0
        };

        let regime = VolatilityRegime::from_ratio(atr_ratio);
        let (tp_multiplier, sl_multiplier) = regime.multipliers();

        VolatilityResult {
            regime,
            current_atr,
            average_atr,
            atr_ratio,
            atr_percentile,
            tp_multiplier,
            sl_multiplier,
        }
    }

    /// Regime for every bar; bars without a full baseline are normal.
    pub fn regime_series(&self, series: &CandleSeries) -> Vec<VolatilityRegime> {
        let atr = self.atr_series(series);
        let baseline = rolling_mean(&atr, self.baseline_period);
        atr.iter()
            .zip(baseline.iter())
            .map(|(&a, &b)| {
                if a.is_nan() || b.is_nan() || b == 0.0 {
                    VolatilityRegime::Normal
                } else {
                    VolatilityRegime::from_ratio(a / b)
                }
            })
            .collect()
    }

    /// Regime distribution and transition statistics for a series.
    pub fn stats(&self, series: &CandleSeries) -> VolatilityStats {
        let regimes = self.regime_series(series);
        let total = regimes.len().max(1);

        let count = |r: VolatilityRegime| regimes.iter().filter(|&&x| x == r).count();
        let low = count(VolatilityRegime::Low);
        let normal = count(VolatilityRegime::Normal);
        let high = count(VolatilityRegime::High);

        let regime_changes = regimes.windows(2).filter(|w| w[0] != w[1]).count();
        let avg_regime_duration_bars = regimes.len() as f64 / (regime_changes + 1) as f64;

        VolatilityStats {
            current: self.classify(series),
            low_percent: low as f64 / total as f64 * 100.0,
            normal_percent: normal as f64 / total as f64 * 100.0,
            high_percent: high as f64 / total as f64 * 100.0,
            regime_changes,
            avg_regime_duration_bars,
        }
    }
}
