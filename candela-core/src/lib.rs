//! Candela Core — channel-breakout engine: domain types, indicator kernels,
//! signal generation, TP/SL ladder, trade state machine, live tracking.
//!
//! This crate contains the heart of the trading engine:
//! - Domain types (bars, candle series, intervals, trades)
//! - Indicator kernels (Wilder smoothing, rolling extrema/stddev, RSI, ADX)
//! - Channel indicator with the 60-row preset table
//! - Signal generator with volume / RSI / ADX / session filters
//! - Six-level TP ladder with cascade stop management
//! - Bar-by-bar trade state machine (TP scan → cascade update → SL scan)
//! - ATR-ratio volatility classifier
//! - Per-symbol live tracker over bounded channels
//! - Ports to external collaborators (market data, candle store, state store,
//!   notifications) and a Parquet candle store implementation

pub mod catalog;
pub mod channel;
pub mod data;
pub mod domain;
pub mod error;
pub mod filters;
pub mod indicators;
pub mod live;
pub mod notify;
pub mod ports;
pub mod presets;
pub mod signal;
pub mod tpsl;
pub mod trade;
pub mod volatility;

pub use channel::{ChannelIndicator, ChannelSeries};
pub use domain::{Bar, CandleSeries, Direction, Interval};
pub use error::CoreError;
pub use presets::{Preset, PRESETS};
pub use signal::{Signal, SignalEngine, SignalKind};
pub use tpsl::{AdaptiveMode, StopMode, TpLevel, TpSlConfig, TpSlLevels};
pub use trade::{BarUpdate, TpHit, Trade, TradeResult, TradeStatus};
pub use volatility::{VolatilityClassifier, VolatilityRegime};
