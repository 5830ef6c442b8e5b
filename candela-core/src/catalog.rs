//! Trading preset catalog — `(symbol, timeframe, regime)` → trading preset.
//!
//! Loaded once from TOML at startup and immutable afterwards; the optimizer
//! and the live tracker receive it by shared reference. Keys follow the
//! `SYMBOL_timeframe_regime` convention (e.g. `BTCUSDT_1h_normal`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::CoreError;
use crate::presets::Preset;
use crate::tpsl::TpSlConfig;
use crate::volatility::VolatilityRegime;

/// One catalog entry: which indicator preset to run and how to ladder exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPreset {
    pub preset_index: usize,
    pub tpsl: TpSlConfig,
}

impl TradingPreset {
    pub fn preset(&self) -> Result<&'static Preset, CoreError> {
        Preset::by_index(self.preset_index)
    }
}

/// The keyed catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetCatalog {
    entries: HashMap<String, TradingPreset>,
}

impl PresetCatalog {
    pub fn key(symbol: &str, timeframe: &str, regime: VolatilityRegime) -> String {
        format!("{symbol}_{timeframe}_{}", regime.as_str())
    }

    /// Parse a catalog from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, CoreError> {
        let catalog: PresetCatalog = toml::from_str(text)
            .map_err(|e| CoreError::invalid(format!("preset catalog parse: {e}")))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CoreError::external("preset_catalog", "load", e))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), CoreError> {
        for (key, entry) in &self.entries {
            entry
                .preset()
                .map_err(|e| CoreError::invalid(format!("catalog entry {key}: {e}")))?;
        }
        Ok(())
    }

    pub fn insert(&mut self, key: String, entry: TradingPreset) {
        self.entries.insert(key, entry);
    }

    /// Look up the trading preset for a pair under the given regime.
    pub fn get_adaptive(
        &self,
        symbol: &str,
        timeframe: &str,
        regime: VolatilityRegime,
    ) -> Option<&TradingPreset> {
        self.entries.get(&Self::key(symbol, timeframe, regime))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[BTCUSDT_1h_normal]
preset_index = 5

[BTCUSDT_1h_normal.tpsl]
tp_percents = [1.0, 2.0, 3.0, 4.0, 7.5, 14.0]
tp_weights = [17.0, 17.0, 17.0, 17.0, 16.0, 16.0]
sl_percent = 8.5
stop_mode = "cascade"
be_after_tp = 4
adaptive_mode = "off"
adaptive_multiplier = 1.0

[BTCUSDT_1h_high]
preset_index = 23

[BTCUSDT_1h_high.tpsl]
tp_percents = [1.3, 2.6, 3.9, 5.2, 9.75, 18.2]
tp_weights = [17.0, 17.0, 17.0, 17.0, 16.0, 16.0]
sl_percent = 10.2
stop_mode = "cascade"
be_after_tp = 4
adaptive_mode = "off"
adaptive_multiplier = 1.0
"#;

    #[test]
    fn parse_and_lookup() {
        let catalog = PresetCatalog::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);

        let normal = catalog
            .get_adaptive("BTCUSDT", "1h", VolatilityRegime::Normal)
            .unwrap();
        assert_eq!(normal.preset_index, 5);
        assert_eq!(normal.preset().unwrap().i1, 70);

        let high = catalog
            .get_adaptive("BTCUSDT", "1h", VolatilityRegime::High)
            .unwrap();
        assert!((high.tpsl.sl_percent - 10.2).abs() < 1e-9);
    }

    #[test]
    fn missing_key_is_none() {
        let catalog = PresetCatalog::from_toml_str(SAMPLE).unwrap();
        assert!(catalog
            .get_adaptive("ETHUSDT", "1h", VolatilityRegime::Normal)
            .is_none());
        assert!(catalog
            .get_adaptive("BTCUSDT", "4h", VolatilityRegime::Normal)
            .is_none());
    }

    #[test]
    fn out_of_range_preset_rejected() {
        let bad = SAMPLE.replace("preset_index = 5", "preset_index = 99");
        assert!(PresetCatalog::from_toml_str(&bad).is_err());
    }

    #[test]
    fn key_convention() {
        assert_eq!(
            PresetCatalog::key("ETHUSDT", "4h", VolatilityRegime::Low),
            "ETHUSDT_4h_low"
        );
    }

    #[test]
    fn toml_roundtrip() {
        let catalog = PresetCatalog::from_toml_str(SAMPLE).unwrap();
        let text = toml::to_string(&catalog).unwrap();
        let reparsed = PresetCatalog::from_toml_str(&text).unwrap();
        assert_eq!(catalog, reparsed);
    }
}
