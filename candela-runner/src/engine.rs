//! Backtest engine — bar-by-bar replay of the signal and trade machinery.
//!
//! The loop holds at most one open trade. Per bar: the open trade is updated
//! first; if it survives and the opposite raw condition fires (with
//! `close_on_opposite_signal`), it is closed at the bar close; a new trade
//! may then open on the same bar. Any trade still open at series end is
//! closed at the last close.
//!
//! A single run is a pure function of its inputs; re-running on the same
//! series and config reproduces the trade list exactly.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use candela_core::channel::{ChannelIndicator, ChannelSeries};
use candela_core::domain::{CandleSeries, Direction};
use candela_core::error::CoreError;
use candela_core::filters::{all_passed, FilterSeries};
use candela_core::tpsl::AdaptiveMode;
use candela_core::trade::Trade;

use crate::config::BacktestConfig;
use crate::metrics::BacktestMetrics;

/// One point of the cumulative equity curve (per closed trade).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// Exit time of the closing trade, milliseconds since epoch (UTC).
    pub timestamp_ms: i64,
    pub equity: f64,
    /// Distance below the running peak, percent, non-positive.
    pub drawdown_percent: f64,
    pub trade_pnl_percent: f64,
}

/// The full output of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub run_id: String,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub total_bars: usize,
    pub trades: Vec<Trade>,
    pub metrics: BacktestMetrics,
    pub equity_curve: Vec<EquityPoint>,
    /// Wall-clock duration of the run; not part of the reproducible payload.
    pub execution_time_ms: f64,
}

impl BacktestResult {
    /// Trades that reached a terminal state (all of them, after a full run).
    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.result.is_some())
    }
}

pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the backtest over a candle series.
    ///
    /// Fails fast on a series shorter than the preset's indicator minimum
    /// (`InsufficientData`) — never a silent empty result.
    pub fn run(&self, series: &CandleSeries) -> Result<BacktestResult, CoreError> {
        let started = Instant::now();

        let series = series.slice_time(self.config.start_ms, self.config.end_ms);
        let indicator = ChannelIndicator::new(self.config.preset);
        let channel = indicator.compute(&series)?;

        let trades = self.simulate(&series, &channel);

        let results: Vec<_> = trades
            .iter()
            .filter_map(|t| t.result.clone())
            .collect();
        let metrics = BacktestMetrics::compute(&results, self.config.initial_capital);
        let equity_curve = build_equity_curve(&trades, self.config.initial_capital);

        Ok(BacktestResult {
            run_id: self.config.run_id(),
            config: self.config.clone(),
            start_ms: series.open_time.first().copied(),
            end_ms: series.open_time.last().copied(),
            total_bars: series.len(),
            trades,
            metrics,
            equity_curve,
            execution_time_ms: started.elapsed().as_secs_f64() * 1_000.0,
        })
    }

    fn simulate(&self, series: &CandleSeries, channel: &ChannelSeries) -> Vec<Trade> {
        let tpsl = self.config.effective_tpsl();
        let filter_data = self.config.filters.prepare(series);

        let mut trades: Vec<Trade> = Vec::new();
        let mut current: Option<usize> = None;

        for idx in 0..series.len() {
            if !channel.is_ready(idx) {
                continue;
            }

            let high = series.high[idx];
            let low = series.low[idx];
            let close = series.close[idx];
            let timestamp = bar_time(series, idx);

            // Open trade first: TP/SL against this bar.
            if let Some(i) = current {
                let update = trades[i].on_bar(timestamp, high, low, close);
                if update.result.is_some() {
                    current = None;
                }
            }

            let raw_long = high > channel.long_trigger[idx];
            let raw_short = low < channel.short_trigger[idx];

            // Opposite raw condition closes the surviving trade at the close.
            if let Some(i) = current {
                if self.config.close_on_opposite_signal {
                    let trade = &mut trades[i];
                    let opposite_fired = match trade.direction {
                        Direction::Long => raw_short,
                        Direction::Short => raw_long,
                    };
                    if opposite_fired {
                        trade.close_by_signal(timestamp, close);
                        current = None;
                    }
                }
            }

            // With no open trade, the first matching condition opens one.
            if current.is_none() {
                let direction = if raw_long {
                    Some(Direction::Long)
                } else if raw_short {
                    Some(Direction::Short)
                } else {
                    None
                };

                if let Some(direction) = direction {
                    if self.filters_pass(&filter_data, series, channel, idx, direction) {
                        let trade =
                            self.open_trade(series, channel, idx, direction, timestamp, &tpsl);
                        trades.push(trade);
                        current = Some(trades.len() - 1);
                    }
                }
            }
        }

        // Series end: force-close the survivor at the last close.
        if let Some(i) = current {
            let last = series.len() - 1;
            trades[i].close_manual(bar_time(series, last), series.close[last]);
        }

        trades
    }

    fn filters_pass(
        &self,
        filter_data: &FilterSeries,
        series: &CandleSeries,
        channel: &ChannelSeries,
        idx: usize,
        direction: Direction,
    ) -> bool {
        if self.config.filters.is_empty() {
            return true;
        }
        let verdicts =
            self.config
                .filters
                .evaluate(filter_data, series, &channel.atr, idx, direction);
        all_passed(&verdicts)
    }

    fn open_trade(
        &self,
        series: &CandleSeries,
        channel: &ChannelSeries,
        idx: usize,
        direction: Direction,
        timestamp: DateTime<Utc>,
        tpsl: &candela_core::tpsl::TpSlConfig,
    ) -> Trade {
        let entry = series.close[idx];
        let adaptive_input = match tpsl.adaptive_mode {
            AdaptiveMode::Off => None,
            AdaptiveMode::Atr => finite(channel.atr[idx]),
            AdaptiveMode::Stddev => finite(channel.stdev[idx]),
        };
        let levels = tpsl.build_levels(entry, direction, adaptive_input);
        Trade::open(
            self.config.symbol.clone(),
            self.config.timeframe.clone(),
            self.config.preset.index,
            timestamp,
            levels,
            tpsl,
        )
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn bar_time(series: &CandleSeries, idx: usize) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(series.open_time[idx])
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}

/// Equity curve over the closed trades, in close order.
fn build_equity_curve(trades: &[Trade], initial_capital: f64) -> Vec<EquityPoint> {
    let mut results: Vec<_> = trades.iter().filter_map(|t| t.result.as_ref()).collect();
    results.sort_by_key(|r| r.exit_timestamp);

    let mut curve = Vec::with_capacity(results.len());
    let mut equity = initial_capital;
    let mut peak = initial_capital;

    for result in results {
        equity *= 1.0 + result.total_pnl_percent / 100.0;
        peak = peak.max(equity);
        let drawdown = if peak > 0.0 {
            (equity - peak) / peak * 100.0
        } else {
            0.0
        };
        curve.push(EquityPoint {
            timestamp_ms: result.exit_timestamp.timestamp_millis(),
            equity,
            drawdown_percent: drawdown,
            trade_pnl_percent: result.total_pnl_percent,
        });
    }

    curve
}
