//! # Candela Runner
//!
//! Batch execution layer for the channel-breakout engine.
//!
//! ## Components
//!
//! - `BacktestConfig`: serializable configuration with a content-addressed id
//! - `BacktestEngine`: bar-by-bar replay of the signal/trade machinery
//! - `BacktestMetrics`: win-rate ladder, Sharpe/Sortino, drawdown, streaks
//! - `GridOptimizer`: parallel preset sweep with validity gate and scoring
//! - `WalkForwardAnalyzer`: rolling train/test windows, OOS efficiency
//! - `RobustnessChecker`: parameter-neighborhood sweep, degradation bounds
//! - `export`: CSV artifacts for trades and grid rows
//! - `synthetic`: seeded OHLCV generators for tests and benches

pub mod config;
pub mod engine;
pub mod export;
pub mod metrics;
pub mod optimizer;
pub mod robustness;
pub mod synthetic;
pub mod walk_forward;

pub use config::BacktestConfig;
pub use engine::{BacktestEngine, BacktestResult, EquityPoint};
pub use metrics::{AcceptanceThresholds, BacktestMetrics};
pub use optimizer::{
    composite_score, GridOptimizer, GridSearchResult, OptimizationConfig, OptimizationResult,
    ScoreWeights,
};
pub use robustness::{NeighborResult, RobustnessChecker, RobustnessConfig, RobustnessResult};
pub use walk_forward::{
    WalkForwardAnalyzer, WalkForwardConfig, WalkForwardError, WalkForwardPeriod, WalkForwardResult,
};
