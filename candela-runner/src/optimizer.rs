//! Grid optimizer — sweep the preset table through the backtest engine.
//!
//! Each preset is an independent task; the sweep runs on a rayon worker
//! pool and results are reported in preset-index order regardless of
//! completion order. A preset whose backtest fails is logged, marked
//! invalid, and never aborts the grid.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use candela_core::domain::CandleSeries;
use candela_core::filters::FilterSet;
use candela_core::presets::{Preset, PRESETS};
use candela_core::tpsl::TpSlConfig;

use crate::config::BacktestConfig;
use crate::engine::{BacktestEngine, BacktestResult};
use crate::metrics::BacktestMetrics;

/// Composite-score weights; must sum to 1 for a 0..100 score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub sharpe: f64,
    pub profit_factor: f64,
    pub win_rate_tp1: f64,
    pub drawdown: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            sharpe: 0.30,
            profit_factor: 0.25,
            win_rate_tp1: 0.25,
            drawdown: 0.20,
        }
    }
}

/// Weighted, clamped-to-[0,100] aggregate of Sharpe, profit factor, TP1 win
/// rate, and max drawdown. The ranking currency of the whole optimizer
/// stack.
pub fn composite_score(m: &BacktestMetrics, weights: &ScoreWeights) -> f64 {
    let clamp = |v: f64| v.clamp(0.0, 100.0);
    let s_sharpe = clamp((m.sharpe_ratio - 1.0) / 2.0 * 100.0);
    let s_pf = clamp((m.profit_factor - 1.0) / 2.0 * 100.0);
    let s_wr = clamp((m.win_rate_tp1() - 50.0) / 40.0 * 100.0);
    let s_dd = clamp((20.0 - m.max_drawdown_percent.abs()) / 20.0 * 100.0);

    weights.sharpe * s_sharpe
        + weights.profit_factor * s_pf
        + weights.win_rate_tp1 * s_wr
        + weights.drawdown * s_dd
}

/// Optimizer configuration: validity thresholds, score weights, preset
/// subset, parallelism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub min_trades: usize,
    pub min_win_rate_tp1: f64,
    pub min_sharpe: f64,
    /// Upper Sharpe bound; implausibly high in-sample Sharpe is treated as
    /// overfitting and rejected.
    pub max_sharpe: f64,
    pub min_profit_factor: f64,
    /// Absolute drawdown bound, percent.
    pub max_drawdown: f64,
    pub weights: ScoreWeights,
    /// Preset indices to sweep; `None` sweeps the whole table.
    pub preset_indices: Option<Vec<usize>>,
    /// Run the sweep on the rayon pool (the sequential path is kept for
    /// debugging).
    pub parallel: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            min_trades: 20,
            min_win_rate_tp1: 65.0,
            min_sharpe: 1.2,
            max_sharpe: 2.5,
            min_profit_factor: 1.4,
            max_drawdown: 15.0,
            weights: ScoreWeights::default(),
            preset_indices: None,
            parallel: true,
        }
    }
}

impl OptimizationConfig {
    /// Validity predicate: the reasons a run fails acceptance, empty when
    /// valid.
    pub fn invalid_reasons(&self, m: &BacktestMetrics) -> Vec<String> {
        let mut reasons = Vec::new();
        if m.total_trades < self.min_trades {
            reasons.push(format!("trades={} < {}", m.total_trades, self.min_trades));
        }
        if m.win_rate_tp1() < self.min_win_rate_tp1 {
            reasons.push(format!(
                "TP1 win rate {:.1}% < {:.1}%",
                m.win_rate_tp1(),
                self.min_win_rate_tp1
            ));
        }
        if m.sharpe_ratio < self.min_sharpe {
            reasons.push(format!(
                "Sharpe {:.2} < {:.2}",
                m.sharpe_ratio, self.min_sharpe
            ));
        }
        if m.sharpe_ratio > self.max_sharpe {
            reasons.push(format!(
                "Sharpe {:.2} > {:.2} (overfit guard)",
                m.sharpe_ratio, self.max_sharpe
            ));
        }
        if m.profit_factor < self.min_profit_factor {
            reasons.push(format!(
                "profit factor {:.2} < {:.2}",
                m.profit_factor, self.min_profit_factor
            ));
        }
        if m.max_drawdown_percent.abs() > self.max_drawdown {
            reasons.push(format!(
                "max drawdown {:.1}% > {:.1}%",
                m.max_drawdown_percent.abs(),
                self.max_drawdown
            ));
        }
        reasons
    }
}

/// Outcome for one preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub preset: Preset,
    /// Absent when the backtest itself failed.
    pub backtest: Option<BacktestResult>,
    pub metrics: BacktestMetrics,
    pub is_valid: bool,
    /// 0..100, zero for invalid results.
    pub composite_score: f64,
    pub invalid_reasons: Vec<String>,
}

/// The full sweep outcome, ordered by preset index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub symbol: String,
    pub timeframe: String,
    pub total_bars: usize,
    pub all_results: Vec<OptimizationResult>,
    pub valid_count: usize,
    /// Highest composite score among the valid results.
    pub best: Option<OptimizationResult>,
    pub execution_time_ms: f64,
}

impl GridSearchResult {
    pub fn valid_results(&self) -> impl Iterator<Item = &OptimizationResult> {
        self.all_results.iter().filter(|r| r.is_valid)
    }

    /// Top N valid results by composite score, descending.
    pub fn top_n(&self, n: usize) -> Vec<&OptimizationResult> {
        let mut valid: Vec<&OptimizationResult> = self.valid_results().collect();
        valid.sort_by(|a, b| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        valid.into_iter().take(n).collect()
    }
}

/// The optimizer: a base config applied across the preset table.
pub struct GridOptimizer {
    symbol: String,
    timeframe: String,
    opt: OptimizationConfig,
    tpsl: TpSlConfig,
    filters: FilterSet,
    initial_capital: f64,
}

impl GridOptimizer {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        opt: OptimizationConfig,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            opt,
            tpsl: TpSlConfig::default(),
            filters: FilterSet::none(),
            initial_capital: 10_000.0,
        }
    }

    pub fn with_tpsl(mut self, tpsl: TpSlConfig) -> Self {
        self.tpsl = tpsl;
        self
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_initial_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    /// Sweep the configured preset subset over the series.
    pub fn run(&self, series: &CandleSeries) -> GridSearchResult {
        let started = Instant::now();
        let indices: Vec<usize> = match &self.opt.preset_indices {
            Some(subset) => subset.clone(),
            None => (0..PRESETS.len()).collect(),
        };

        info!(
            symbol = %self.symbol,
            timeframe = %self.timeframe,
            presets = indices.len(),
            bars = series.len(),
            "starting grid search"
        );

        // Distinct presets share nothing; collect preserves input order, so
        // the report stays deterministic under parallel completion.
        let all_results: Vec<OptimizationResult> = if self.opt.parallel && indices.len() > 1 {
            indices
                .par_iter()
                .map(|&idx| self.evaluate_preset(idx, series))
                .collect()
        } else {
            indices
                .iter()
                .map(|&idx| self.evaluate_preset(idx, series))
                .collect()
        };

        let valid_count = all_results.iter().filter(|r| r.is_valid).count();
        let best = all_results
            .iter()
            .filter(|r| r.is_valid)
            .max_by(|a, b| {
                a.composite_score
                    .partial_cmp(&b.composite_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();

        let execution_time_ms = started.elapsed().as_secs_f64() * 1_000.0;
        info!(
            valid = valid_count,
            tested = all_results.len(),
            best_score = best.as_ref().map(|b| b.composite_score).unwrap_or(0.0),
            elapsed_ms = execution_time_ms,
            "grid search complete"
        );

        GridSearchResult {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            total_bars: series.len(),
            all_results,
            valid_count,
            best,
            execution_time_ms,
        }
    }

    fn evaluate_preset(&self, preset_index: usize, series: &CandleSeries) -> OptimizationResult {
        let preset = match Preset::by_index(preset_index) {
            Ok(p) => *p,
            Err(e) => {
                warn!(preset_index, error = %e, "skipping preset");
                return OptimizationResult {
                    preset: PRESETS[0],
                    backtest: None,
                    metrics: BacktestMetrics::default(),
                    is_valid: false,
                    composite_score: 0.0,
                    invalid_reasons: vec![e.to_string()],
                };
            }
        };

        let config = BacktestConfig {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            preset,
            tpsl: self.tpsl.clone(),
            filters: self.filters.clone(),
            initial_capital: self.initial_capital,
            cascade_stop: true,
            close_on_opposite_signal: true,
            start_ms: None,
            end_ms: None,
        };

        match BacktestEngine::new(config).run(series) {
            Ok(backtest) => {
                let metrics = backtest.metrics.clone();
                let invalid_reasons = self.opt.invalid_reasons(&metrics);
                let is_valid = invalid_reasons.is_empty();
                let composite_score = if is_valid {
                    composite_score(&metrics, &self.opt.weights)
                } else {
                    0.0
                };
                OptimizationResult {
                    preset,
                    backtest: Some(backtest),
                    metrics,
                    is_valid,
                    composite_score,
                    invalid_reasons,
                }
            }
            Err(e) => {
                warn!(preset_index, error = %e, "backtest failed; marking invalid");
                OptimizationResult {
                    preset,
                    backtest: None,
                    metrics: BacktestMetrics::default(),
                    is_valid: false,
                    composite_score: 0.0,
                    invalid_reasons: vec![format!("backtest error: {e}")],
                }
            }
        }
    }
}
