//! Ports to external collaborators.
//!
//! The engine only consumes these narrow interfaces; the collaborators
//! themselves (exchange client, database, notification transport) live
//! outside this workspace. Implementations map their native failures into
//! [`PortError`], which the engine wraps as `CoreError::External`.

use serde_json::Value;
use thiserror::Error;

use crate::domain::{Bar, Interval};
use crate::signal::Signal;
use crate::trade::{Trade, TradeResult};

/// A collaborator failure: which collaborator, which operation, what it said.
#[derive(Debug, Error)]
#[error("{collaborator} failed during {op}: {message}")]
pub struct PortError {
    pub collaborator: &'static str,
    pub op: &'static str,
    pub message: String,
}

impl PortError {
    pub fn new(collaborator: &'static str, op: &'static str, e: impl std::fmt::Display) -> Self {
        Self {
            collaborator,
            op,
            message: e.to_string(),
        }
    }
}

impl From<PortError> for crate::error::CoreError {
    fn from(e: PortError) -> Self {
        crate::error::CoreError::External {
            collaborator: e.collaborator,
            op: e.op,
            message: e.message,
        }
    }
}

/// Historical market data.
pub trait MarketDataSource {
    /// Closed klines for `[start_ms, end_ms)`.
    fn get_klines(
        &self,
        symbol: &str,
        interval: Interval,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Bar>, PortError>;
}

/// On-disk candle storage keyed by symbol + interval.
pub trait CandleStore {
    fn save(&self, bars: &[Bar], symbol: &str, interval: Interval) -> Result<(), PortError>;
    /// Merge new bars into the stored series, deduplicating on open time.
    fn append(&self, bars: &[Bar], symbol: &str, interval: Interval) -> Result<(), PortError>;
    fn load(
        &self,
        symbol: &str,
        interval: Interval,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
    ) -> Result<Vec<Bar>, PortError>;
    fn list_symbols(&self) -> Result<Vec<String>, PortError>;
    fn list_intervals(&self, symbol: &str) -> Result<Vec<Interval>, PortError>;
}

/// Persistent state for the live layer. Batch optimizers never touch this.
pub trait StateStore {
    fn save_position(&self, trade: &Trade) -> Result<(), PortError>;
    fn delete_position(&self, symbol: &str) -> Result<(), PortError>;
    fn get_open_positions(&self) -> Result<Vec<Trade>, PortError>;
    fn save_signal(&self, signal: &Signal) -> Result<(), PortError>;
    fn update_signal_status(&self, signal_id: &str, status: &str) -> Result<(), PortError>;
    fn save_trade_history(&self, trade: &Trade, result: &TradeResult) -> Result<(), PortError>;
    fn set_setting(&self, key: &str, value: &Value) -> Result<(), PortError>;
    fn get_setting(&self, key: &str) -> Result<Option<Value>, PortError>;
    fn log_event(&self, kind: &str, payload: &Value) -> Result<(), PortError>;
}

/// Outbound notification channel; text is pre-formatted by `notify`.
pub trait NotificationTransport {
    fn send(&self, text: &str, priority: bool) -> Result<(), PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn port_error_wraps_into_core_error() {
        let err = PortError::new("market_data", "get_klines", "HTTP 429");
        let core: CoreError = err.into();
        match core {
            CoreError::External {
                collaborator, op, ..
            } => {
                assert_eq!(collaborator, "market_data");
                assert_eq!(op, "get_klines");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
