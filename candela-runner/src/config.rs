//! Serializable backtest configuration.

use serde::{Deserialize, Serialize};

use candela_core::error::CoreError;
use candela_core::filters::FilterSet;
use candela_core::presets::Preset;
use candela_core::tpsl::TpSlConfig;

/// Unique identifier for a backtest run (content-addressed hash).
pub type RunId = String;

/// Everything needed to reproduce a single backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub timeframe: String,
    /// The indicator parameterization. Usually a canonical table row; the
    /// robustness checker substitutes perturbed copies.
    pub preset: Preset,
    pub tpsl: TpSlConfig,
    pub filters: FilterSet,
    pub initial_capital: f64,
    /// Ratchet the stop through the TP ladder (off = the stop never moves).
    pub cascade_stop: bool,
    /// Close an open trade when the opposite raw condition fires.
    pub close_on_opposite_signal: bool,
    /// Optional bar range, milliseconds since epoch (UTC), half-open.
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

impl BacktestConfig {
    /// A config for a canonical preset index with defaults everywhere else.
    pub fn for_preset(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        preset_index: usize,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            preset: *Preset::by_index(preset_index)?,
            tpsl: TpSlConfig::default(),
            filters: FilterSet::none(),
            initial_capital: 10_000.0,
            cascade_stop: true,
            close_on_opposite_signal: true,
            start_ms: None,
            end_ms: None,
        })
    }

    /// Deterministic content hash. Identical configs share a RunId, so
    /// results can be deduplicated or cached by id.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("BacktestConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// The TP/SL config the engine actually applies: with `cascade_stop`
    /// off, stop management is disabled regardless of the ladder config.
    pub fn effective_tpsl(&self) -> TpSlConfig {
        let mut tpsl = self.tpsl.clone();
        if !self.cascade_stop {
            tpsl.stop_mode = candela_core::tpsl::StopMode::None;
        }
        tpsl
    }
}
