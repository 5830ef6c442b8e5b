//! Walk-forward analysis — rolling train/test optimization against
//! overfitting.
//!
//! Windows are generated from the earliest timestamp: a train segment of
//! `train_months` followed immediately by a test segment of `test_months`,
//! advancing by `step_months` until the test segment would run past the last
//! bar (a month is 30 days of wall time). Each window optimizes on train
//! only and evaluates the chosen preset on the unseen test segment; test
//! bars are strictly later than every train bar.
//!
//! The outer window loop is sequential; the inner grid search uses its own
//! parallelism.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use candela_core::domain::CandleSeries;
use candela_core::filters::FilterSet;
use candela_core::presets::Preset;
use candela_core::tpsl::TpSlConfig;

use crate::config::BacktestConfig;
use crate::engine::BacktestEngine;
use crate::metrics::BacktestMetrics;
use crate::optimizer::{composite_score, GridOptimizer, OptimizationConfig};

const MONTH_MS: i64 = 30 * 24 * 3_600_000;

/// Walk-forward configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    pub train_months: i64,
    pub test_months: i64,
    pub step_months: i64,
    /// Minimum number of windows; fewer is a typed failure.
    pub min_periods: usize,
    pub opt: OptimizationConfig,
    pub tpsl: TpSlConfig,
    pub filters: FilterSet,
    pub initial_capital: f64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_months: 6,
            test_months: 2,
            step_months: 2,
            min_periods: 4,
            opt: OptimizationConfig::default(),
            tpsl: TpSlConfig::default(),
            filters: FilterSet::none(),
            initial_capital: 10_000.0,
        }
    }
}

/// One train/test window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardPeriod {
    pub period_index: usize,
    /// Window bounds, milliseconds since epoch (UTC); train is
    /// `[train_start, train_end)`, test `[train_end, test_end)`.
    pub train_start_ms: i64,
    pub train_end_ms: i64,
    pub test_start_ms: i64,
    pub test_end_ms: i64,
    pub train_bars: usize,
    pub test_bars: usize,
    /// The preset chosen on train; absent when no preset was valid.
    pub best_preset: Option<Preset>,
    pub test_metrics: Option<BacktestMetrics>,
    pub train_score: f64,
    pub test_score: f64,
    /// `test_score / train_score`; zero when train_score is zero.
    pub efficiency: f64,
}

/// Errors from walk-forward analysis.
#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("insufficient data: {windows} windows < minimum {min_periods}")]
    InsufficientData { windows: usize, min_periods: usize },
    #[error("series is empty")]
    EmptySeries,
}

/// The full analysis outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub symbol: String,
    pub timeframe: String,
    pub total_bars: usize,
    pub periods: Vec<WalkForwardPeriod>,
    pub successful_periods: usize,
    /// Metrics over all test-window trades pooled together.
    pub aggregated_metrics: Option<BacktestMetrics>,
    pub avg_efficiency: f64,
    pub min_efficiency: f64,
    /// Fraction of successful windows choosing the most common preset.
    pub preset_stability: f64,
    pub most_common_preset: Option<usize>,
    pub is_robust: bool,
    pub failure_reasons: Vec<String>,
    pub execution_time_ms: f64,
}

/// The analyzer.
pub struct WalkForwardAnalyzer {
    symbol: String,
    timeframe: String,
    config: WalkForwardConfig,
}

impl WalkForwardAnalyzer {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        config: WalkForwardConfig,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            config,
        }
    }

    /// Enumerate window bounds over the series' time span.
    pub fn windows(&self, series: &CandleSeries) -> Result<Vec<(i64, i64, i64)>, WalkForwardError> {
        let (Some(&first), Some(&last)) = (series.open_time.first(), series.open_time.last())
        else {
            return Err(WalkForwardError::EmptySeries);
        };

        let train_span = self.config.train_months * MONTH_MS;
        let test_span = self.config.test_months * MONTH_MS;
        let step = self.config.step_months * MONTH_MS;

        let mut windows = Vec::new();
        let mut train_start = first;
        loop {
            let train_end = train_start + train_span;
            let test_end = train_end + test_span;
            if test_end > last {
                break;
            }
            windows.push((train_start, train_end, test_end));
            train_start += step;
        }

        if windows.len() < self.config.min_periods {
            return Err(WalkForwardError::InsufficientData {
                windows: windows.len(),
                min_periods: self.config.min_periods,
            });
        }
        Ok(windows)
    }

    /// Run the analysis.
    pub fn run(&self, series: &CandleSeries) -> Result<WalkForwardResult, WalkForwardError> {
        let started = Instant::now();
        let windows = self.windows(series)?;
        info!(
            symbol = %self.symbol,
            windows = windows.len(),
            bars = series.len(),
            "starting walk-forward analysis"
        );

        let mut periods = Vec::with_capacity(windows.len());
        let mut pooled_trades = Vec::new();

        for (index, &(train_start, train_end, test_end)) in windows.iter().enumerate() {
            let (period, test_trades) =
                self.analyze_window(series, index, train_start, train_end, test_end);
            pooled_trades.extend(test_trades);
            periods.push(period);
        }

        let successful: Vec<&WalkForwardPeriod> = periods
            .iter()
            .filter(|p| p.best_preset.is_some() && p.test_metrics.is_some())
            .collect();

        let aggregated_metrics = if pooled_trades.is_empty() {
            None
        } else {
            Some(BacktestMetrics::compute(
                &pooled_trades,
                self.config.initial_capital,
            ))
        };

        // Stability over the windows that completed train + test. A window
        // whose test leg collapsed (efficiency ≤ 0) drags both statistics
        // down instead of being quietly excluded.
        let efficiencies: Vec<f64> = successful.iter().map(|p| p.efficiency).collect();
        let avg_efficiency = crate::metrics::mean(&efficiencies);
        let min_efficiency = efficiencies
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let min_efficiency = if min_efficiency.is_finite() {
            min_efficiency
        } else {
            0.0
        };

        let (most_common_preset, preset_stability) = preset_frequency(&successful);

        let mut result = WalkForwardResult {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            total_bars: series.len(),
            successful_periods: successful.len(),
            periods,
            aggregated_metrics,
            avg_efficiency,
            min_efficiency,
            preset_stability,
            most_common_preset,
            is_robust: false,
            failure_reasons: Vec::new(),
            execution_time_ms: 0.0,
        };
        self.check_robustness(&mut result);
        result.execution_time_ms = started.elapsed().as_secs_f64() * 1_000.0;

        info!(
            successful = result.successful_periods,
            robust = result.is_robust,
            avg_efficiency = result.avg_efficiency,
            "walk-forward complete"
        );
        Ok(result)
    }

    /// Optimize on the train segment, evaluate the winner on the test
    /// segment. Returns the period summary plus the test segment's closed
    /// trades for pooling.
    fn analyze_window(
        &self,
        series: &CandleSeries,
        index: usize,
        train_start: i64,
        train_end: i64,
        test_end: i64,
    ) -> (WalkForwardPeriod, Vec<candela_core::trade::TradeResult>) {
        let train = series.slice_time(Some(train_start), Some(train_end));
        let test = series.slice_time(Some(train_end), Some(test_end));

        let mut period = WalkForwardPeriod {
            period_index: index,
            train_start_ms: train_start,
            train_end_ms: train_end,
            test_start_ms: train_end,
            test_end_ms: test_end,
            train_bars: train.len(),
            test_bars: test.len(),
            best_preset: None,
            test_metrics: None,
            train_score: 0.0,
            test_score: 0.0,
            efficiency: 0.0,
        };

        if train.len() < 100 || test.len() < 20 {
            warn!(
                window = index,
                train_bars = train.len(),
                test_bars = test.len(),
                "window skipped: not enough bars"
            );
            return (period, Vec::new());
        }

        let optimizer = GridOptimizer::new(&self.symbol, &self.timeframe, self.config.opt.clone())
            .with_tpsl(self.config.tpsl.clone())
            .with_filters(self.config.filters.clone())
            .with_initial_capital(self.config.initial_capital);
        let train_result = optimizer.run(&train);

        let Some(best) = train_result.best else {
            warn!(window = index, "no valid preset on train segment");
            return (period, Vec::new());
        };
        period.best_preset = Some(best.preset);
        period.train_score = best.composite_score;

        let mut test_trades = Vec::new();
        match BacktestEngine::new(self.backtest_config(&best.preset)).run(&test) {
            Ok(result) => {
                let metrics = result.metrics.clone();
                period.test_score = if metrics.total_trades == 0 {
                    0.0
                } else {
                    composite_score(&metrics, &self.config.opt.weights)
                };
                if period.train_score > 0.0 {
                    period.efficiency = period.test_score / period.train_score;
                }
                period.test_metrics = Some(metrics);
                test_trades = result
                    .trades
                    .iter()
                    .filter_map(|t| t.result.clone())
                    .collect();
            }
            Err(e) => {
                warn!(window = index, error = %e, "test backtest failed");
            }
        }

        (period, test_trades)
    }

    fn backtest_config(&self, preset: &Preset) -> BacktestConfig {
        BacktestConfig {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            preset: *preset,
            tpsl: self.config.tpsl.clone(),
            filters: self.config.filters.clone(),
            initial_capital: self.config.initial_capital,
            cascade_stop: true,
            close_on_opposite_signal: true,
            start_ms: None,
            end_ms: None,
        }
    }

    /// Robustness predicate over the aggregate outcome.
    fn check_robustness(&self, result: &mut WalkForwardResult) {
        let mut reasons = Vec::new();

        if result.successful_periods < self.config.min_periods {
            reasons.push(format!(
                "successful periods {} < {}",
                result.successful_periods, self.config.min_periods
            ));
        }
        if result.avg_efficiency < 0.5 {
            reasons.push(format!("mean efficiency {:.2} < 0.5", result.avg_efficiency));
        }
        if result.min_efficiency < 0.3 {
            reasons.push(format!("min efficiency {:.2} < 0.3", result.min_efficiency));
        }
        if let Some(m) = &result.aggregated_metrics {
            if m.win_rate_tp1() < self.config.opt.min_win_rate_tp1 {
                reasons.push(format!(
                    "aggregated TP1 win rate {:.1}% < {:.1}%",
                    m.win_rate_tp1(),
                    self.config.opt.min_win_rate_tp1
                ));
            }
            if m.sharpe_ratio < self.config.opt.min_sharpe {
                reasons.push(format!(
                    "aggregated Sharpe {:.2} < {:.2}",
                    m.sharpe_ratio, self.config.opt.min_sharpe
                ));
            }
            if m.max_drawdown_percent.abs() > self.config.opt.max_drawdown {
                reasons.push(format!(
                    "aggregated drawdown {:.1}% > {:.1}%",
                    m.max_drawdown_percent.abs(),
                    self.config.opt.max_drawdown
                ));
            }
        }

        result.is_robust = reasons.is_empty();
        result.failure_reasons = reasons;
    }
}

fn preset_frequency(successful: &[&WalkForwardPeriod]) -> (Option<usize>, f64) {
    let mut freq: HashMap<usize, usize> = HashMap::new();
    for period in successful {
        if let Some(preset) = &period.best_preset {
            *freq.entry(preset.index).or_insert(0) += 1;
        }
    }
    let Some((&index, &count)) = freq.iter().max_by_key(|&(&index, &count)| (count, index)) else {
        return (None, 0.0);
    };
    (Some(index), count as f64 / successful.len() as f64)
}
