//! Take-profit ladder and stop-loss configuration.
//!
//! Six TP levels with position weights (normalized to sum to 100), one stop,
//! and a stop-management mode. Levels are derived from an entry price and a
//! direction; adaptive mode rescales the percents from an ATR or stddev
//! snapshot.

use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::error::CoreError;
use crate::volatility::VolatilityRegime;

pub const TP_COUNT: usize = 6;

/// Stop-management policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// The stop never moves.
    None,
    /// Move the stop to entry once `be_after_tp` TP levels are hit.
    Breakeven,
    /// Ratchet the stop to the previous TP on every hit (TP1 → entry).
    Cascade,
}

/// How TP/SL percents are derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveMode {
    /// Use the configured percents verbatim.
    Off,
    /// Rescale by the ATR/entry ratio.
    Atr,
    /// Rescale by the stddev/entry ratio.
    Stddev,
}

/// TP/SL configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpSlConfig {
    /// TP distances from entry, percent, strictly ascending and positive.
    pub tp_percents: [f64; TP_COUNT],
    /// Position fraction closed at each TP, percent; normalized to sum 100.
    pub tp_weights: [f64; TP_COUNT],
    /// Stop distance from entry, percent, positive.
    pub sl_percent: f64,
    pub stop_mode: StopMode,
    /// TP count that triggers the breakeven move (1..=6, breakeven mode only).
    pub be_after_tp: usize,
    pub adaptive_mode: AdaptiveMode,
    /// Multiplier applied in adaptive mode.
    pub adaptive_multiplier: f64,
}

impl Default for TpSlConfig {
    fn default() -> Self {
        Self {
            tp_percents: [1.0, 2.0, 3.0, 4.0, 7.5, 14.0],
            tp_weights: [17.0, 17.0, 17.0, 17.0, 16.0, 16.0],
            sl_percent: 8.5,
            stop_mode: StopMode::Cascade,
            be_after_tp: 4,
            adaptive_mode: AdaptiveMode::Off,
            adaptive_multiplier: 1.0,
        }
    }
}

impl TpSlConfig {
    /// Validate and normalize a configuration.
    ///
    /// Fails fast (`InvalidInput`) on non-ascending or non-positive TP
    /// percents, a non-positive stop, or an out-of-range `be_after_tp`.
    /// Weights are renormalized to sum to 100.
    pub fn new(
        tp_percents: [f64; TP_COUNT],
        tp_weights: [f64; TP_COUNT],
        sl_percent: f64,
        stop_mode: StopMode,
        be_after_tp: usize,
        adaptive_mode: AdaptiveMode,
        adaptive_multiplier: f64,
    ) -> Result<Self, CoreError> {
        if tp_percents.iter().any(|&p| p <= 0.0) {
            return Err(CoreError::invalid("TP percents must be strictly positive"));
        }
        if tp_percents.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::invalid("TP percents must be strictly ascending"));
        }
        if sl_percent <= 0.0 {
            return Err(CoreError::invalid("SL percent must be positive"));
        }
        if !(1..=TP_COUNT).contains(&be_after_tp) {
            return Err(CoreError::invalid(format!(
                "be_after_tp must be in 1..=6, got {be_after_tp}"
            )));
        }
        if tp_weights.iter().any(|&w| w < 0.0) {
            return Err(CoreError::invalid("TP weights must be non-negative"));
        }

        let mut config = Self {
            tp_percents,
            tp_weights,
            sl_percent,
            stop_mode,
            be_after_tp,
            adaptive_mode,
            adaptive_multiplier,
        };
        config.normalize_weights()?;
        Ok(config)
    }

    fn normalize_weights(&mut self) -> Result<(), CoreError> {
        let total: f64 = self.tp_weights.iter().sum();
        if total <= 0.0 {
            return Err(CoreError::invalid("TP weights must sum to a positive value"));
        }
        if (total - 100.0).abs() > 0.01 {
            let factor = 100.0 / total;
            for w in &mut self.tp_weights {
                *w *= factor;
            }
        }
        Ok(())
    }

    /// The canonical per-regime configurations.
    pub fn for_regime(regime: VolatilityRegime) -> Self {
        let (tps, sl) = match regime {
            VolatilityRegime::Low => ([0.8, 1.6, 2.4, 3.2, 6.0, 11.2], 6.8),
            VolatilityRegime::Normal => ([1.0, 2.0, 3.0, 4.0, 7.5, 14.0], 8.5),
            VolatilityRegime::High => ([1.3, 2.6, 3.9, 5.2, 9.75, 18.2], 10.2),
        };
        Self {
            tp_percents: tps,
            sl_percent: sl,
            ..Self::default()
        }
    }

    /// Effective percents given an optional adaptive input (ATR or stddev,
    /// depending on the mode). A missing or zero input falls back to the
    /// fixed percents.
    pub fn effective_percents(&self, entry: f64, adaptive_input: Option<f64>) -> ([f64; TP_COUNT], f64) {
        let input = match (self.adaptive_mode, adaptive_input) {
            (AdaptiveMode::Off, _) | (_, None) => return (self.tp_percents, self.sl_percent),
            (_, Some(v)) => v,
        };
        if input <= 0.0 || entry <= 0.0 {
            return (self.tp_percents, self.sl_percent);
        }

        // Each configured percent is multiplied by (input/entry)·multiplier·100.
        let scale = input / entry * self.adaptive_multiplier * 100.0;
        let mut tps = self.tp_percents;
        for p in &mut tps {
            *p *= scale;
        }
        (tps, self.sl_percent * scale)
    }
}

/// One TP rung, derived for a concrete trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TpLevel {
    /// 1..=6.
    pub index: usize,
    pub price: f64,
    pub percent: f64,
    /// Position fraction to close here, percent.
    pub weight: f64,
    pub hit: bool,
    pub hit_price: f64,
}

/// The full TP/SL ladder for one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpSlLevels {
    pub entry_price: f64,
    pub direction: Direction,
    pub tp_levels: [TpLevel; TP_COUNT],
    pub sl_price: f64,
    /// Moves under cascade/breakeven management, only ever tightening.
    pub current_sl: f64,
}

impl TpSlLevels {
    pub fn hit_count(&self) -> usize {
        self.tp_levels.iter().filter(|tp| tp.hit).count()
    }

    pub fn remaining_position(&self) -> f64 {
        let closed: f64 = self
            .tp_levels
            .iter()
            .filter(|tp| tp.hit)
            .map(|tp| tp.weight)
            .sum();
        (100.0 - closed).max(0.0)
    }

    pub fn tp_prices(&self) -> [f64; TP_COUNT] {
        let mut prices = [0.0; TP_COUNT];
        for (out, tp) in prices.iter_mut().zip(self.tp_levels.iter()) {
            *out = tp.price;
        }
        prices
    }
}

impl TpSlConfig {
    /// Derive the price ladder for a trade.
    ///
    /// `adaptive_input` is the ATR (mode `Atr`) or stddev (mode `Stddev`)
    /// snapshot at signal time.
    pub fn build_levels(
        &self,
        entry: f64,
        direction: Direction,
        adaptive_input: Option<f64>,
    ) -> TpSlLevels {
        let (tp_percents, sl_percent) = self.effective_percents(entry, adaptive_input);

        let mut tp_levels = [TpLevel {
            index: 0,
            price: 0.0,
            percent: 0.0,
            weight: 0.0,
            hit: false,
            hit_price: 0.0,
        }; TP_COUNT];

        for (i, level) in tp_levels.iter_mut().enumerate() {
            let pct = tp_percents[i];
            let price = match direction {
                Direction::Long => entry * (1.0 + pct / 100.0),
                Direction::Short => entry * (1.0 - pct / 100.0),
            };
            *level = TpLevel {
                index: i + 1,
                price,
                percent: pct,
                weight: self.tp_weights[i],
                hit: false,
                hit_price: 0.0,
            };
        }

        let sl_price = match direction {
            Direction::Long => entry * (1.0 - sl_percent / 100.0),
            Direction::Short => entry * (1.0 + sl_percent / 100.0),
        };

        TpSlLevels {
            entry_price: entry,
            direction,
            tp_levels,
            sl_price,
            current_sl: sl_price,
        }
    }
}
