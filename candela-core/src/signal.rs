//! Signal generation — breakout detection over the channel indicator.
//!
//! The generator walks the series with a single position-state variable
//! (flat / long / short). A raw condition in a direction different from the
//! current state emits a signal; repeated same-direction breakouts do not.
//! All enabled filters must pass for a signal to be accepted. Advisory
//! prepare signals fire when price comes within 0.3% of a trigger.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::channel::{ChannelIndicator, ChannelSeries};
use crate::domain::{CandleSeries, Direction};
use crate::filters::{all_passed, FilterSet};
use crate::presets::Preset;

/// Offset applied to the triggers for advisory prepare signals, percent.
pub const PREPARE_OFFSET_PERCENT: f64 = 0.3;

/// Default signal time-to-live in live mode.
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// What a signal asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Long,
    Short,
    PrepareLong,
    PrepareShort,
}

impl SignalKind {
    pub fn direction(&self) -> Direction {
        match self {
            SignalKind::Long | SignalKind::PrepareLong => Direction::Long,
            SignalKind::Short | SignalKind::PrepareShort => Direction::Short,
        }
    }

    /// Confirmed signals open trades; prepare signals are advisory only.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SignalKind::Long | SignalKind::Short)
    }
}

/// A trading signal emitted on a closed bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: String,
    pub kind: SignalKind,
    /// Close of the trigger bar.
    pub entry_price: f64,
    pub preset_index: usize,
    pub high_channel: f64,
    pub low_channel: f64,
    pub mid_channel: f64,
    /// The pierced trigger value.
    pub trigger_price: f64,
    pub atr: f64,
    /// Per-filter verdicts at emission time.
    pub filters: BTreeMap<String, bool>,
    /// Past this instant the signal must not open a trade.
    pub expires_at: DateTime<Utc>,
}

impl Signal {
    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Position state the generator tracks while walking the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionState {
    Flat,
    Long,
    Short,
}

/// The signal engine: one preset, one filter set, one symbol/timeframe pair.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    indicator: ChannelIndicator,
    filters: FilterSet,
    symbol: String,
    timeframe: String,
    ttl: Duration,
}

impl SignalEngine {
    pub fn new(
        preset: Preset,
        filters: FilterSet,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
    ) -> Self {
        Self {
            indicator: ChannelIndicator::new(preset),
            filters,
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn preset(&self) -> &Preset {
        self.indicator.preset()
    }

    /// Generate signals for the whole series.
    ///
    /// A series shorter than the indicator minimum yields an empty list.
    pub fn generate(&self, series: &CandleSeries) -> Vec<Signal> {
        let channel = match self.indicator.compute(series) {
            Ok(channel) => channel,
            Err(_) => return Vec::new(),
        };
        self.generate_with_channel(series, &channel)
    }

    /// Generate signals given an already computed indicator.
    pub fn generate_with_channel(
        &self,
        series: &CandleSeries,
        channel: &ChannelSeries,
    ) -> Vec<Signal> {
        let filter_data = self.filters.prepare(series);
        let mut signals = Vec::new();
        let mut state = PositionState::Flat;

        for idx in 0..series.len() {
            if !channel.is_ready(idx) {
                continue;
            }

            let high = series.high[idx];
            let low = series.low[idx];
            let long_trigger = channel.long_trigger[idx];
            let short_trigger = channel.short_trigger[idx];

            let raw_long = high > long_trigger;
            let raw_short = low < short_trigger;

            let check = |direction: Direction| -> Option<BTreeMap<String, bool>> {
                let verdicts =
                    self.filters
                        .evaluate(&filter_data, series, &channel.atr, idx, direction);
                all_passed(&verdicts).then_some(verdicts)
            };

            // Fresh breakouts from flat or against the held direction.
            if raw_long && state != PositionState::Long {
                if let Some(filters) = check(Direction::Long) {
                    signals.push(self.make_signal(series, channel, idx, SignalKind::Long, filters));
                    state = PositionState::Long;
                }
            } else if raw_short && state != PositionState::Short {
                if let Some(filters) = check(Direction::Short) {
                    signals.push(self.make_signal(series, channel, idx, SignalKind::Short, filters));
                    state = PositionState::Short;
                }
            }

            // Opposite breakout on the same bar flips the state again; the
            // caller uses it to close the held trade and reverse.
            if raw_short && state == PositionState::Long {
                if let Some(filters) = check(Direction::Short) {
                    signals.push(self.make_signal(series, channel, idx, SignalKind::Short, filters));
                    state = PositionState::Short;
                }
            } else if raw_long && state == PositionState::Short {
                if let Some(filters) = check(Direction::Long) {
                    signals.push(self.make_signal(series, channel, idx, SignalKind::Long, filters));
                    state = PositionState::Long;
                }
            }

            // Advisory prepare signals: within the offset band but not
            // through the trigger.
            let prepare_long = high > long_trigger * (1.0 - PREPARE_OFFSET_PERCENT / 100.0);
            let prepare_short = low < short_trigger * (1.0 + PREPARE_OFFSET_PERCENT / 100.0);
            if prepare_long && !raw_long && state != PositionState::Long {
                signals.push(self.make_signal(
                    series,
                    channel,
                    idx,
                    SignalKind::PrepareLong,
                    BTreeMap::new(),
                ));
            } else if prepare_short && !raw_short && state != PositionState::Short {
                signals.push(self.make_signal(
                    series,
                    channel,
                    idx,
                    SignalKind::PrepareShort,
                    BTreeMap::new(),
                ));
            }
        }

        signals
    }

    /// The most recent signal on the series, if its last ready bar fired.
    pub fn latest(&self, series: &CandleSeries) -> Option<Signal> {
        self.generate(series).into_iter().last()
    }

    fn make_signal(
        &self,
        series: &CandleSeries,
        channel: &ChannelSeries,
        idx: usize,
        kind: SignalKind,
        filters: BTreeMap<String, bool>,
    ) -> Signal {
        let timestamp = Utc
            .timestamp_millis_opt(series.open_time[idx])
            .single()
            .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
        let trigger_price = match kind.direction() {
            Direction::Long => channel.long_trigger[idx],
            Direction::Short => channel.short_trigger[idx],
        };
        Signal {
            timestamp,
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            kind,
            entry_price: series.close[idx],
            preset_index: self.preset().index,
            high_channel: channel.high_channel[idx],
            low_channel: channel.low_channel[idx],
            mid_channel: channel.mid_channel[idx],
            trigger_price,
            atr: channel.atr[idx],
            filters,
            expires_at: timestamp + self.ttl,
        }
    }
}
