//! Parameter robustness — does the result survive in its neighborhood?
//!
//! Perturb each enabled parameter of the base preset by ±`variation_percent`
//! and backtest the Cartesian product of the variations (the base tuple
//! excluded). A preset whose neighbors collapse only worked at its exact
//! coordinates; a robust preset degrades gracefully.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use candela_core::domain::CandleSeries;
use candela_core::filters::FilterSet;
use candela_core::presets::Preset;
use candela_core::tpsl::TpSlConfig;

use crate::config::BacktestConfig;
use crate::engine::BacktestEngine;
use crate::metrics::BacktestMetrics;
use crate::optimizer::{composite_score, ScoreWeights};

/// Robustness sweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessConfig {
    /// Neighborhood radius, percent of each base parameter.
    pub variation_percent: f64,
    pub vary_i1: bool,
    pub vary_i2: bool,
    pub vary_i3: bool,
    pub vary_i4: bool,
    pub vary_i5: bool,
    /// Neighbors below this trade count score zero and count as invalid.
    pub min_trades: usize,
    /// Bound on the worst neighbor's score drop, percent of the base score.
    pub max_score_degradation: f64,
    /// Bound on the mean score drop.
    pub max_mean_degradation: f64,
    /// Minimum fraction of valid neighbors.
    pub min_neighbors_valid: f64,
    /// Bound on the score standard deviation across valid neighbors.
    pub max_score_std: f64,
    pub weights: ScoreWeights,
    pub tpsl: TpSlConfig,
    pub filters: FilterSet,
    pub initial_capital: f64,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            variation_percent: 15.0,
            vary_i1: true,
            vary_i2: true,
            vary_i3: true,
            vary_i4: true,
            vary_i5: true,
            min_trades: 20,
            max_score_degradation: 30.0,
            max_mean_degradation: 21.0,
            min_neighbors_valid: 0.7,
            max_score_std: 20.0,
            weights: ScoreWeights::default(),
            tpsl: TpSlConfig::default(),
            filters: FilterSet::none(),
            initial_capital: 10_000.0,
        }
    }
}

/// One neighbor's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborResult {
    pub i1: usize,
    pub i2: usize,
    pub i3: f64,
    pub i4: f64,
    pub i5: f64,
    pub metrics: BacktestMetrics,
    pub score: f64,
    /// Score drop vs the base, percent of the base score.
    pub score_degradation: f64,
    pub is_valid: bool,
    pub is_profitable: bool,
}

/// The full sweep outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustnessResult {
    pub base_preset: Preset,
    pub base_score: f64,
    pub base_metrics: BacktestMetrics,
    pub neighbors: Vec<NeighborResult>,
    pub valid_neighbors: usize,
    pub profitable_neighbors: usize,
    pub avg_neighbor_score: f64,
    pub min_neighbor_score: f64,
    pub max_neighbor_score: f64,
    pub score_std: f64,
    pub avg_degradation: f64,
    pub max_degradation: f64,
    pub is_robust: bool,
    /// 0..100.
    pub robustness_score: f64,
    pub failure_reasons: Vec<String>,
    pub execution_time_ms: f64,
}

/// The checker: a base preset evaluated against its parameter neighborhood.
pub struct RobustnessChecker {
    symbol: String,
    timeframe: String,
    base: Preset,
    config: RobustnessConfig,
}

impl RobustnessChecker {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        base: Preset,
        config: RobustnessConfig,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            base,
            config,
        }
    }

    /// Neighbor parameter tuples: the Cartesian product of
    /// `{p·(1−v), p, p·(1+v)}` per enabled parameter, integers rounded and
    /// floored at 1, duplicates removed, the base excluded.
    pub fn neighbor_params(&self) -> Vec<(usize, usize, f64, f64, f64)> {
        let v = self.config.variation_percent / 100.0;
        let base = &self.base;

        let int_variations = |value: usize, enabled: bool| -> Vec<usize> {
            if !enabled {
                return vec![value];
            }
            let low = ((value as f64 * (1.0 - v)).round() as usize).max(1);
            let high = ((value as f64 * (1.0 + v)).round() as usize).max(1);
            let mut variations = vec![low, value, high];
            variations.sort();
            variations.dedup();
            variations
        };
        let real_variations = |value: f64, enabled: bool| -> Vec<f64> {
            if !enabled {
                return vec![value];
            }
            vec![value * (1.0 - v), value, value * (1.0 + v)]
        };

        let i1s = int_variations(base.i1, self.config.vary_i1);
        let i2s = int_variations(base.i2, self.config.vary_i2);
        let i3s = real_variations(base.i3, self.config.vary_i3);
        let i4s = real_variations(base.i4, self.config.vary_i4);
        let i5s = real_variations(base.i5, self.config.vary_i5);

        let base_tuple = (base.i1, base.i2, base.i3, base.i4, base.i5);
        let mut neighbors = Vec::new();
        for &i1 in &i1s {
            for &i2 in &i2s {
                for &i3 in &i3s {
                    for &i4 in &i4s {
                        for &i5 in &i5s {
                            let tuple = (i1, i2, i3, i4, i5);
                            if tuple != base_tuple {
                                neighbors.push(tuple);
                            }
                        }
                    }
                }
            }
        }
        neighbors
    }

    /// Run the sweep. The base backtest runs first to anchor the score.
    pub fn run(&self, series: &CandleSeries) -> RobustnessResult {
        let started = Instant::now();

        let (base_metrics, base_score) =
            self.score_params(series, self.base.i1, self.base.i2, self.base.i3, self.base.i4, self.base.i5);
        let neighbors_params = self.neighbor_params();
        info!(
            preset = self.base.index,
            neighbors = neighbors_params.len(),
            base_score,
            "starting robustness sweep"
        );

        let mut neighbors = Vec::with_capacity(neighbors_params.len());
        for (i1, i2, i3, i4, i5) in neighbors_params {
            let (metrics, score) = self.score_params(series, i1, i2, i3, i4, i5);
            let score_degradation = if base_score > 0.0 {
                (base_score - score) / base_score * 100.0
            } else {
                0.0
            };
            neighbors.push(NeighborResult {
                i1,
                i2,
                i3,
                i4,
                i5,
                is_valid: metrics.total_trades >= self.config.min_trades,
                is_profitable: metrics.total_pnl_percent > 0.0,
                metrics,
                score,
                score_degradation,
            });
        }

        let result = self.aggregate(base_metrics, base_score, neighbors, started);
        info!(
            robust = result.is_robust,
            score = result.robustness_score,
            valid = result.valid_neighbors,
            tested = result.neighbors.len(),
            "robustness sweep complete"
        );
        result
    }

    fn score_params(
        &self,
        series: &CandleSeries,
        i1: usize,
        i2: usize,
        i3: f64,
        i4: f64,
        i5: f64,
    ) -> (BacktestMetrics, f64) {
        let preset = match Preset::custom(self.base.index, i1, i2, i3, i4, i5) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "degenerate neighbor parameters");
                return (BacktestMetrics::default(), 0.0);
            }
        };
        let config = BacktestConfig {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            preset,
            tpsl: self.config.tpsl.clone(),
            filters: self.config.filters.clone(),
            initial_capital: self.config.initial_capital,
            cascade_stop: true,
            close_on_opposite_signal: true,
            start_ms: None,
            end_ms: None,
        };
        match BacktestEngine::new(config).run(series) {
            Ok(result) => {
                let score = if result.metrics.total_trades < self.config.min_trades {
                    0.0
                } else {
                    composite_score(&result.metrics, &self.config.weights)
                };
                (result.metrics, score)
            }
            Err(e) => {
                warn!(i1, i2, error = %e, "neighbor backtest failed");
                (BacktestMetrics::default(), 0.0)
            }
        }
    }

    fn aggregate(
        &self,
        base_metrics: BacktestMetrics,
        base_score: f64,
        neighbors: Vec<NeighborResult>,
        started: Instant,
    ) -> RobustnessResult {
        let valid: Vec<&NeighborResult> = neighbors.iter().filter(|n| n.is_valid).collect();
        let valid_scores: Vec<f64> = valid.iter().map(|n| n.score).collect();
        let degradations: Vec<f64> = valid.iter().map(|n| n.score_degradation).collect();

        let avg_neighbor_score = crate::metrics::mean(&valid_scores);
        let min_neighbor_score = valid_scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max_neighbor_score = valid_scores
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let score_std = crate::metrics::std_dev(&valid_scores);
        let avg_degradation = crate::metrics::mean(&degradations);
        let max_degradation = degradations.iter().copied().fold(0.0, f64::max);

        let total = neighbors.len();
        let valid_ratio = if total > 0 {
            valid.len() as f64 / total as f64
        } else {
            0.0
        };

        let mut reasons = Vec::new();
        if valid_ratio < self.config.min_neighbors_valid {
            reasons.push(format!(
                "valid neighbors {:.0}% < {:.0}%",
                valid_ratio * 100.0,
                self.config.min_neighbors_valid * 100.0
            ));
        }
        if max_degradation > self.config.max_score_degradation {
            reasons.push(format!(
                "max degradation {max_degradation:.1}% > {:.1}%",
                self.config.max_score_degradation
            ));
        }
        if avg_degradation > self.config.max_mean_degradation {
            reasons.push(format!(
                "mean degradation {avg_degradation:.1}% > {:.1}%",
                self.config.max_mean_degradation
            ));
        }
        if score_std > self.config.max_score_std {
            reasons.push(format!(
                "score stddev {score_std:.1} > {:.1}",
                self.config.max_score_std
            ));
        }

        // 0.4·valid ratio + 0.4·mean-to-base score ratio + 0.2·stability,
        // rescaled to 0..100.
        let robustness_score = if total > 0 && base_score > 0.0 {
            let score_ratio = avg_neighbor_score / base_score;
            let stability = 1.0 - (score_std / 50.0).min(1.0);
            (0.4 * valid_ratio + 0.4 * score_ratio + 0.2 * stability) * 100.0
        } else {
            0.0
        };

        let profitable_neighbors = neighbors.iter().filter(|n| n.is_profitable).count();
        RobustnessResult {
            base_preset: self.base,
            base_score,
            base_metrics,
            valid_neighbors: valid.len(),
            profitable_neighbors,
            neighbors,
            avg_neighbor_score,
            min_neighbor_score: if min_neighbor_score.is_finite() {
                min_neighbor_score
            } else {
                0.0
            },
            max_neighbor_score: if max_neighbor_score.is_finite() {
                max_neighbor_score
            } else {
                0.0
            },
            score_std,
            avg_degradation,
            max_degradation,
            is_robust: reasons.is_empty(),
            robustness_score,
            failure_reasons: reasons,
            execution_time_ms: started.elapsed().as_secs_f64() * 1_000.0,
        }
    }
}
