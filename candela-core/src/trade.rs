//! Trade — per-bar evolution of a single open position.
//!
//! Bar processing order is fixed: extrema update → TP scan (ascending) →
//! cascade/breakeven stop update → SL scan. A bar that touches a TP advances
//! the cascade stop before its own SL check. Changing this order invalidates
//! backtest comparability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::tpsl::{StopMode, TpSlConfig, TpSlLevels, TP_COUNT};

/// Why / whether a trade is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Open,
    /// Last TP hit or position fully closed by partial exits.
    ClosedTp,
    ClosedSl,
    /// Closed because the opposite raw condition fired.
    ClosedSignal,
    ClosedManual,
}

impl TradeStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, TradeStatus::Open)
    }
}

/// One take-profit fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpHit {
    /// 1..=6, strictly increasing across a trade's hits.
    pub index: usize,
    pub price: f64,
    pub hit_price: f64,
    pub timestamp: DateTime<Utc>,
    /// Position fraction closed on this fill, percent.
    pub closed_fraction: f64,
    /// PnL of this fraction, percent of entry.
    pub pnl_percent: f64,
}

/// Final accounting for a closed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub status: TradeStatus,
    pub exit_price: f64,
    pub exit_timestamp: DateTime<Utc>,
    /// Position-weighted PnL, percent of entry.
    pub total_pnl_percent: f64,
    pub tp_hits: Vec<TpHit>,
    /// Max favorable excursion, percent of entry.
    pub max_profit_percent: f64,
    /// Max adverse excursion, percent of entry (non-positive).
    pub max_drawdown_percent: f64,
    pub duration_bars: usize,
}

impl TradeResult {
    pub fn is_profitable(&self) -> bool {
        self.total_pnl_percent > 0.0
    }

    pub fn reached_tp(&self, index: usize) -> bool {
        self.tp_hits.iter().any(|h| h.index == index)
    }
}

/// A stop move produced by cascade/breakeven management.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlMove {
    pub old: f64,
    pub new: f64,
    /// True when the stop landed on the entry price.
    pub breakeven: bool,
}

/// Everything that happened to a trade on one bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarUpdate {
    pub tp_hits: Vec<TpHit>,
    pub sl_move: Option<SlMove>,
    pub result: Option<TradeResult>,
}

/// An open (or closed) trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub timeframe: String,
    pub preset_index: usize,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_timestamp: DateTime<Utc>,

    pub levels: TpSlLevels,
    pub stop_mode: StopMode,
    pub be_after_tp: usize,

    pub status: TradeStatus,
    /// Remaining position fraction, percent.
    pub remaining: f64,
    pub tp_hits: Vec<TpHit>,

    pub bar_count: usize,
    max_price: f64,
    min_price: f64,
    /// Max favorable excursion, percent.
    pub max_profit: f64,
    /// Max adverse excursion, percent (non-positive).
    pub max_adverse: f64,

    pub result: Option<TradeResult>,
}

impl Trade {
    /// Open a trade from an entry and a prebuilt ladder.
    pub fn open(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        preset_index: usize,
        entry_timestamp: DateTime<Utc>,
        levels: TpSlLevels,
        config: &TpSlConfig,
    ) -> Self {
        let symbol = symbol.into();
        let timeframe = timeframe.into();
        let id = format!(
            "{}-{}-{}",
            symbol,
            entry_timestamp.timestamp_millis(),
            levels.direction
        );
        Self {
            id,
            symbol,
            timeframe,
            preset_index,
            direction: levels.direction,
            entry_price: levels.entry_price,
            entry_timestamp,
            levels,
            stop_mode: config.stop_mode,
            be_after_tp: config.be_after_tp,
            status: TradeStatus::Open,
            remaining: 100.0,
            tp_hits: Vec::new(),
            bar_count: 0,
            max_price: f64::NEG_INFINITY,
            min_price: f64::INFINITY,
            max_profit: 0.0,
            max_adverse: 0.0,
            result: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_long(&self) -> bool {
        self.direction.is_long()
    }

    pub fn current_sl(&self) -> f64 {
        self.levels.current_sl
    }

    /// Signed PnL of a price move from entry, percent of entry.
    fn pnl_percent(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => (price - self.entry_price) / self.entry_price * 100.0,
            Direction::Short => (self.entry_price - price) / self.entry_price * 100.0,
        }
    }

    /// Process one closed bar. A no-op returning an empty update once the
    /// trade is closed.
    pub fn on_bar(
        &mut self,
        timestamp: DateTime<Utc>,
        high: f64,
        low: f64,
        _close: f64,
    ) -> BarUpdate {
        let mut update = BarUpdate::default();
        if !self.is_open() {
            return update;
        }

        self.bar_count += 1;

        // 1. Extrema.
        self.max_price = self.max_price.max(high);
        self.min_price = self.min_price.min(low);
        let (favorable, adverse) = match self.direction {
            Direction::Long => (self.pnl_percent(self.max_price), self.pnl_percent(self.min_price)),
            Direction::Short => (self.pnl_percent(self.min_price), self.pnl_percent(self.max_price)),
        };
        self.max_profit = self.max_profit.max(favorable);
        self.max_adverse = self.max_adverse.min(adverse);

        // 2. TP scan, ascending.
        for i in 0..TP_COUNT {
            if self.levels.tp_levels[i].hit {
                continue;
            }
            let tp_price = self.levels.tp_levels[i].price;
            let hit = match self.direction {
                Direction::Long => high >= tp_price,
                Direction::Short => low <= tp_price,
            };
            if !hit {
                continue;
            }

            self.levels.tp_levels[i].hit = true;
            self.levels.tp_levels[i].hit_price = tp_price;

            let closed_fraction = self.levels.tp_levels[i].weight.min(self.remaining);
            let hit = TpHit {
                index: i + 1,
                price: tp_price,
                hit_price: tp_price,
                timestamp,
                closed_fraction,
                pnl_percent: self.pnl_percent(tp_price),
            };
            self.remaining -= closed_fraction;
            self.tp_hits.push(hit.clone());
            update.tp_hits.push(hit);

            if i + 1 == TP_COUNT || self.remaining <= 0.0 {
                update.result = Some(self.close(TradeStatus::ClosedTp, tp_price, timestamp));
                return update;
            }
        }

        // 3. Stop management after new hits.
        if !update.tp_hits.is_empty() {
            if let Some(sl_move) = self.update_stop() {
                update.sl_move = Some(sl_move);
            }
        }

        // 4. SL scan against the (possibly tightened) current stop.
        let sl = self.levels.current_sl;
        let sl_hit = match self.direction {
            Direction::Long => low <= sl,
            Direction::Short => high >= sl,
        };
        if sl_hit {
            update.result = Some(self.close(TradeStatus::ClosedSl, sl, timestamp));
        }

        update
    }

    /// Cascade: after the n-th hit the stop candidate is entry (n = 1) or
    /// TP(n−1) (n ≥ 2). Breakeven: the candidate is entry, once, when the
    /// hit count reaches the threshold. Either way the stop only tightens.
    fn update_stop(&mut self) -> Option<SlMove> {
        let hit_count = self.tp_hits.len();
        if hit_count == 0 {
            return None;
        }

        let candidate = match self.stop_mode {
            StopMode::None => return None,
            StopMode::Cascade => {
                if hit_count == 1 {
                    self.entry_price
                } else {
                    self.levels.tp_levels[hit_count - 2].price
                }
            }
            StopMode::Breakeven => {
                if hit_count < self.be_after_tp {
                    return None;
                }
                self.entry_price
            }
        };

        let old = self.levels.current_sl;
        let new = match self.direction {
            Direction::Long => old.max(candidate),
            Direction::Short => old.min(candidate),
        };
        if new == old {
            return None;
        }
        self.levels.current_sl = new;
        Some(SlMove {
            old,
            new,
            breakeven: new == self.entry_price,
        })
    }

    /// Close at the bar close because the opposite raw condition fired.
    pub fn close_by_signal(&mut self, timestamp: DateTime<Utc>, price: f64) -> TradeResult {
        self.close(TradeStatus::ClosedSignal, price, timestamp)
    }

    /// Close at an arbitrary price (end of series, operator action).
    pub fn close_manual(&mut self, timestamp: DateTime<Utc>, price: f64) -> TradeResult {
        self.close(TradeStatus::ClosedManual, price, timestamp)
    }

    fn close(&mut self, status: TradeStatus, exit_price: f64, timestamp: DateTime<Utc>) -> TradeResult {
        if let Some(result) = &self.result {
            // Already closed; nothing mutates past the first close.
            return result.clone();
        }
        self.status = status;

        let mut total_pnl: f64 = self
            .tp_hits
            .iter()
            .map(|h| h.pnl_percent * h.closed_fraction / 100.0)
            .sum();
        if self.remaining > 0.0 {
            total_pnl += self.pnl_percent(exit_price) * self.remaining / 100.0;
        }

        let result = TradeResult {
            status,
            exit_price,
            exit_timestamp: timestamp,
            total_pnl_percent: total_pnl,
            tp_hits: self.tp_hits.clone(),
            max_profit_percent: self.max_profit,
            max_drawdown_percent: self.max_adverse,
            duration_bars: self.bar_count,
        };
        self.result = Some(result.clone());
        result
    }
}
