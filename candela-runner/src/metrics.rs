//! Performance metrics — pure functions over the closed-trade list.
//!
//! Every metric is a pure function: trade results and/or equity curve in,
//! scalar out. No dependencies on the engine or the optimizer stack.
//!
//! Sortino and profit factor report `+∞` when there are no losing trades
//! (JSON-serialized as null); callers must tolerate non-finite values there.

use serde::{Deserialize, Serialize};

use candela_core::trade::TradeResult;

/// Periods-per-year constant for annualizing trade-sequence ratios.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Aggregate metrics for one backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,

    /// Overall win rate, percent.
    pub win_rate: f64,
    /// Fraction of trades that reached TP_k during their life, percent,
    /// indexed by k−1.
    pub win_rate_tp: [f64; 6],

    pub total_pnl_percent: f64,
    pub avg_win_percent: f64,
    pub avg_loss_percent: f64,
    pub max_win_percent: f64,
    pub max_loss_percent: f64,

    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Non-positive, percent.
    pub max_drawdown_percent: f64,
    /// Longest stretch of closed trades spent below the running peak.
    pub max_drawdown_duration: usize,
    pub profit_factor: f64,

    pub expectancy: f64,
    pub recovery_factor: f64,
    pub avg_trade_duration_bars: f64,

    pub final_equity: f64,
    pub peak_equity: f64,

    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl BacktestMetrics {
    pub fn win_rate_tp1(&self) -> f64 {
        self.win_rate_tp[0]
    }

    /// Compute all metrics from the closed-trade list.
    pub fn compute(trades: &[TradeResult], initial_capital: f64) -> Self {
        if trades.is_empty() {
            return Self {
                final_equity: initial_capital,
                peak_equity: initial_capital,
                ..Self::default()
            };
        }

        let total = trades.len();
        let pnls: Vec<f64> = trades.iter().map(|t| t.total_pnl_percent).collect();
        let win_pnls: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
        let loss_pnls: Vec<f64> = pnls.iter().copied().filter(|&p| p < 0.0).collect();
        let breakeven = pnls.iter().filter(|&&p| p == 0.0).count();

        let win_rate = win_pnls.len() as f64 / total as f64 * 100.0;
        let mut win_rate_tp = [0.0; 6];
        for (k, rate) in win_rate_tp.iter_mut().enumerate() {
            let reached = trades.iter().filter(|t| t.reached_tp(k + 1)).count();
            *rate = reached as f64 / total as f64 * 100.0;
        }

        let equity = equity_curve(&pnls, initial_capital);
        let (max_dd, dd_duration) = max_drawdown(&equity);

        let avg_win = mean(&win_pnls);
        let avg_loss = mean(&loss_pnls);
        let total_pnl: f64 = pnls.iter().sum();

        let recovery_factor = if max_dd.abs() > 0.0 {
            total_pnl / max_dd.abs()
        } else {
            0.0
        };

        let durations: Vec<f64> = trades.iter().map(|t| t.duration_bars as f64).collect();

        Self {
            total_trades: total,
            winning_trades: win_pnls.len(),
            losing_trades: loss_pnls.len(),
            breakeven_trades: breakeven,
            win_rate,
            win_rate_tp,
            total_pnl_percent: total_pnl,
            avg_win_percent: avg_win,
            avg_loss_percent: avg_loss,
            max_win_percent: win_pnls.iter().copied().fold(0.0, f64::max),
            max_loss_percent: loss_pnls.iter().copied().fold(0.0, f64::min),
            sharpe_ratio: sharpe_ratio(&pnls, PERIODS_PER_YEAR),
            sortino_ratio: sortino_ratio(&pnls, PERIODS_PER_YEAR),
            max_drawdown_percent: max_dd,
            max_drawdown_duration: dd_duration,
            profit_factor: profit_factor(&pnls),
            expectancy: win_rate / 100.0 * avg_win + (100.0 - win_rate) / 100.0 * avg_loss,
            recovery_factor,
            avg_trade_duration_bars: mean(&durations),
            final_equity: *equity.last().unwrap(),
            peak_equity: equity.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            max_consecutive_wins: max_consecutive(&pnls, true),
            max_consecutive_losses: max_consecutive(&pnls, false),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Annualized Sharpe ratio over the per-trade return sequence.
///
/// `mean(returns) / stddev(returns, sample) · √N`. Zero for fewer than two
/// trades or zero variance.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean(returns) / std * periods_per_year.sqrt()
}

/// Annualized Sortino ratio: the denominator is the sample stddev of the
/// negative returns only. `+∞` when there are no losing trades.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let negative: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if negative.is_empty() {
        return f64::INFINITY;
    }
    let downside_std = std_dev(&negative);
    if downside_std < 1e-15 {
        return f64::INFINITY;
    }
    mean(returns) / downside_std * periods_per_year.sqrt()
}

/// Compound the per-trade returns into an equity curve. The initial capital
/// is the first point; each closed trade appends one point.
pub fn equity_curve(pnls: &[f64], initial_capital: f64) -> Vec<f64> {
    let mut curve = Vec::with_capacity(pnls.len() + 1);
    let mut equity = initial_capital;
    curve.push(equity);
    for pnl in pnls {
        equity *= 1.0 + pnl / 100.0;
        curve.push(equity);
    }
    curve
}

/// Maximum drawdown (non-positive, percent) and the longest stretch of
/// points spent below the running peak.
pub fn max_drawdown(equity: &[f64]) -> (f64, usize) {
    if equity.len() < 2 {
        return (0.0, 0);
    }

    let mut peak = equity[0];
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for &eq in equity {
        if eq > peak {
            peak = eq;
        }
        if eq < peak {
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        } else {
            current_duration = 0;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak * 100.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    (max_dd, max_duration)
}

/// Σ positive returns / |Σ negative returns|. `+∞` when there are no losses
/// but there are gains; zero when there are neither.
pub fn profit_factor(pnls: &[f64]) -> f64 {
    let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    if gross_loss == 0.0 {
        return if gross_profit > 0.0 { f64::INFINITY } else { 0.0 };
    }
    gross_profit / gross_loss
}

// ─── Acceptance gate ────────────────────────────────────────────────

/// Minimum requirements a run must meet to be considered usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceThresholds {
    pub min_win_rate: f64,
    pub min_win_rate_tp1: f64,
    pub min_sharpe: f64,
    /// Absolute bound on drawdown, percent.
    pub max_drawdown: f64,
    pub min_profit_factor: f64,
}

impl Default for AcceptanceThresholds {
    fn default() -> Self {
        Self {
            min_win_rate: 40.0,
            min_win_rate_tp1: 70.0,
            min_sharpe: 1.0,
            max_drawdown: 15.0,
            min_profit_factor: 1.5,
        }
    }
}

impl AcceptanceThresholds {
    /// Pass/fail with the list of violated criteria.
    pub fn check(&self, m: &BacktestMetrics) -> (bool, Vec<String>) {
        let mut failed = Vec::new();
        if m.win_rate < self.min_win_rate {
            failed.push(format!(
                "win rate {:.1}% < {:.1}%",
                m.win_rate, self.min_win_rate
            ));
        }
        if m.win_rate_tp1() < self.min_win_rate_tp1 {
            failed.push(format!(
                "TP1 win rate {:.1}% < {:.1}%",
                m.win_rate_tp1(),
                self.min_win_rate_tp1
            ));
        }
        if m.sharpe_ratio < self.min_sharpe {
            failed.push(format!(
                "Sharpe {:.2} < {:.2}",
                m.sharpe_ratio, self.min_sharpe
            ));
        }
        if m.max_drawdown_percent.abs() > self.max_drawdown {
            failed.push(format!(
                "max drawdown {:.1}% > {:.1}%",
                m.max_drawdown_percent.abs(),
                self.max_drawdown
            ));
        }
        if m.profit_factor < self.min_profit_factor {
            failed.push(format!(
                "profit factor {:.2} < {:.2}",
                m.profit_factor, self.min_profit_factor
            ));
        }
        (failed.is_empty(), failed)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(pnls: &[f64], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for &pnl in pnls {
        if (pnl > 0.0) == winners && pnl != 0.0 {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use candela_core::trade::{TpHit, TradeStatus};
    use chrono::{TimeZone, Utc};

    fn make_result(pnl: f64, tp_indices: &[usize]) -> TradeResult {
        let ts = Utc.timestamp_millis_opt(0).unwrap();
        TradeResult {
            status: if pnl >= 0.0 {
                TradeStatus::ClosedTp
            } else {
                TradeStatus::ClosedSl
            },
            exit_price: 100.0 * (1.0 + pnl / 100.0),
            exit_timestamp: ts,
            total_pnl_percent: pnl,
            tp_hits: tp_indices
                .iter()
                .map(|&i| TpHit {
                    index: i,
                    price: 100.0,
                    hit_price: 100.0,
                    timestamp: ts,
                    closed_fraction: 17.0,
                    pnl_percent: pnl.max(0.0),
                })
                .collect(),
            max_profit_percent: pnl.max(0.0),
            max_drawdown_percent: pnl.min(0.0),
            duration_bars: 10,
        }
    }

    // ── Counts and win rates ──

    #[test]
    fn metric_algebra_holds() {
        let trades = vec![
            make_result(2.0, &[1, 2]),
            make_result(-1.0, &[]),
            make_result(0.0, &[]),
            make_result(1.0, &[1]),
        ];
        let m = BacktestMetrics::compute(&trades, 10_000.0);
        assert_eq!(m.total_trades, 4);
        assert_eq!(
            m.total_trades,
            m.winning_trades + m.losing_trades + m.breakeven_trades
        );
        assert!((m.win_rate - m.winning_trades as f64 / 4.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn tp_ladder_win_rates() {
        let trades = vec![
            make_result(2.0, &[1, 2]),
            make_result(1.0, &[1]),
            make_result(-1.0, &[]),
            make_result(-2.0, &[]),
        ];
        let m = BacktestMetrics::compute(&trades, 10_000.0);
        assert!((m.win_rate_tp1() - 50.0).abs() < 1e-9);
        assert!((m.win_rate_tp[1] - 25.0).abs() < 1e-9);
        assert!((m.win_rate_tp[5] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn empty_trades_keep_capital() {
        let m = BacktestMetrics::compute(&[], 10_000.0);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.final_equity, 10_000.0);
        assert_eq!(m.peak_equity, 10_000.0);
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    // ── Sharpe / Sortino ──

    #[test]
    fn sharpe_zero_variance_is_zero() {
        assert_eq!(sharpe_ratio(&[1.0, 1.0, 1.0], 252.0), 0.0);
    }

    #[test]
    fn sharpe_known_value() {
        // [1, 0]: mean 0.5, sample variance (0.25 + 0.25)/1 = 0.5
        let s = sharpe_ratio(&[1.0, 0.0], 252.0);
        let expected = 0.5 / 0.5_f64.sqrt() * 252.0_f64.sqrt();
        assert!((s - expected).abs() < 1e-9);
    }

    #[test]
    fn sortino_no_losers_is_infinite() {
        assert!(sortino_ratio(&[1.0, 2.0, 3.0], 252.0).is_infinite());
    }

    #[test]
    fn sortino_with_losers_is_finite() {
        let s = sortino_ratio(&[2.0, -1.0, 3.0, -2.0], 252.0);
        assert!(s.is_finite());
    }

    // ── Drawdown ──

    #[test]
    fn drawdown_sign_and_value() {
        // 100 → 110 → 90 → 95: peak 110, trough 90 → −18.18%
        let equity = vec![100.0, 110.0, 90.0, 95.0];
        let (dd, duration) = max_drawdown(&equity);
        assert!(dd <= 0.0);
        assert!((dd - (90.0 - 110.0) / 110.0 * 100.0).abs() < 1e-9);
        assert_eq!(duration, 2);
    }

    #[test]
    fn drawdown_monotonic_is_zero() {
        let equity: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        assert_eq!(max_drawdown(&equity), (0.0, 0));
    }

    #[test]
    fn equity_curve_compounds() {
        let curve = equity_curve(&[10.0, -10.0], 100.0);
        assert_eq!(curve.len(), 3);
        assert!((curve[1] - 110.0).abs() < 1e-9);
        assert!((curve[2] - 99.0).abs() < 1e-9);
    }

    // ── Profit factor / expectancy / recovery ──

    #[test]
    fn profit_factor_mixed() {
        // +5, +3, −2 → 8 / 2 = 4
        assert!((profit_factor(&[5.0, 3.0, -2.0]) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_no_losses_is_infinite() {
        assert!(profit_factor(&[5.0, 3.0]).is_infinite());
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn expectancy_formula() {
        let trades = vec![
            make_result(2.0, &[1]),
            make_result(2.0, &[1]),
            make_result(-1.0, &[]),
            make_result(-1.0, &[]),
        ];
        let m = BacktestMetrics::compute(&trades, 10_000.0);
        // 50%·2 + 50%·(−1) = 0.5
        assert!((m.expectancy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn recovery_factor_relates_pnl_to_drawdown() {
        let trades = vec![make_result(10.0, &[1]), make_result(-5.0, &[])];
        let m = BacktestMetrics::compute(&trades, 10_000.0);
        assert!(m.max_drawdown_percent < 0.0);
        assert!(
            (m.recovery_factor - m.total_pnl_percent / m.max_drawdown_percent.abs()).abs() < 1e-9
        );
    }

    // ── Streaks ──

    #[test]
    fn streaks() {
        let trades = vec![
            make_result(1.0, &[1]),
            make_result(1.0, &[1]),
            make_result(1.0, &[1]),
            make_result(-1.0, &[]),
            make_result(-1.0, &[]),
            make_result(1.0, &[1]),
        ];
        let m = BacktestMetrics::compute(&trades, 10_000.0);
        assert_eq!(m.max_consecutive_wins, 3);
        assert_eq!(m.max_consecutive_losses, 2);
    }

    // ── Acceptance gate ──

    #[test]
    fn acceptance_gate_lists_violations() {
        let trades = vec![make_result(-1.0, &[]); 5];
        let m = BacktestMetrics::compute(&trades, 10_000.0);
        let thresholds = AcceptanceThresholds::default();
        let (passed, failures) = thresholds.check(&m);
        assert!(!passed);
        assert!(failures.iter().any(|f| f.contains("win rate")));
        assert!(failures.iter().any(|f| f.contains("profit factor")));
    }

    #[test]
    fn acceptance_gate_passes_good_run() {
        // Alternate sizes so the return variance stays modest.
        let mut trades = Vec::new();
        for i in 0..30 {
            trades.push(make_result(if i % 3 == 2 { 1.8 } else { 2.2 }, &[1, 2]));
        }
        for _ in 0..3 {
            trades.push(make_result(-1.0, &[]));
        }
        let m = BacktestMetrics::compute(&trades, 10_000.0);
        let (passed, failures) = AcceptanceThresholds::default().check(&m);
        assert!(passed, "unexpected failures: {failures:?}");
    }
}
