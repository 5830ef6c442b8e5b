//! Property tests for the universal trade and engine invariants.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use candela_core::domain::Direction;
use candela_core::notify::{format_new_signal, parse_signal, SignalMessage};
use candela_core::presets::Preset;
use candela_core::tpsl::{StopMode, TpSlConfig};
use candela_core::trade::Trade;
use candela_runner::config::BacktestConfig;
use candela_runner::engine::BacktestEngine;
use candela_runner::synthetic;

fn ts(hour: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(hour * 3_600_000).unwrap()
}

fn open_trade(direction: Direction, stop_mode: StopMode) -> Trade {
    let config = TpSlConfig {
        stop_mode,
        ..TpSlConfig::default()
    };
    let levels = config.build_levels(100.0, direction, None);
    Trade::open("BTCUSDT", "1h", 0, ts(0), levels, &config)
}

/// Random bar stream around the entry: (center offset %, half-range %).
fn bar_stream() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-12.0_f64..12.0, 0.1_f64..6.0), 1..80)
}

fn drive(trade: &mut Trade, bars: &[(f64, f64)]) -> Vec<(f64, f64)> {
    // Returns the per-bar (current_sl before, after) history.
    let mut sl_history = Vec::new();
    for (i, &(center, half_range)) in bars.iter().enumerate() {
        let mid = 100.0 * (1.0 + center / 100.0);
        let high = mid * (1.0 + half_range / 100.0);
        let low = mid * (1.0 - half_range / 100.0);
        let before = trade.current_sl();
        trade.on_bar(ts(i as i64 + 1), high, low, mid);
        sl_history.push((before, trade.current_sl()));
        if !trade.is_open() {
            break;
        }
    }
    sl_history
}

proptest! {
    /// TP hit indices are strictly increasing over any bar stream.
    #[test]
    fn tp_indices_strictly_increase(bars in bar_stream(), long in any::<bool>()) {
        let direction = if long { Direction::Long } else { Direction::Short };
        let mut trade = open_trade(direction, StopMode::Cascade);
        drive(&mut trade, &bars);

        for pair in trade.tp_hits.windows(2) {
            prop_assert!(pair[0].index < pair[1].index);
        }
    }

    /// Closed fraction plus remainder conserves the position.
    #[test]
    fn position_is_conserved(bars in bar_stream(), long in any::<bool>()) {
        let direction = if long { Direction::Long } else { Direction::Short };
        let mut trade = open_trade(direction, StopMode::Cascade);
        drive(&mut trade, &bars);

        let closed: f64 = trade.tp_hits.iter().map(|h| h.closed_fraction).sum();
        prop_assert!(closed + trade.remaining <= 100.0 + 1e-6);
        if trade.result.is_some() {
            // On close, the remainder exits at the exit price: everything
            // adds back to exactly 100.
            prop_assert!((closed + trade.remaining - 100.0).abs() < 1e-6);
        }
    }

    /// The stop only ever tightens: non-decreasing for longs,
    /// non-increasing for shorts.
    #[test]
    fn stop_tightens_monotonically(bars in bar_stream(), long in any::<bool>()) {
        let direction = if long { Direction::Long } else { Direction::Short };
        let mut trade = open_trade(direction, StopMode::Cascade);
        let history = drive(&mut trade, &bars);

        for (before, after) in history {
            match direction {
                Direction::Long => prop_assert!(after >= before - 1e-12),
                Direction::Short => prop_assert!(after <= before + 1e-12),
            }
        }
    }

    /// Cascade law: after n hits the stop is at entry (n = 1) or TP(n−1),
    /// unless monotonic tightening already placed it higher.
    #[test]
    fn cascade_stop_lands_on_the_ladder(bars in bar_stream(), long in any::<bool>()) {
        let direction = if long { Direction::Long } else { Direction::Short };
        let mut trade = open_trade(direction, StopMode::Cascade);
        let initial_sl = trade.current_sl();
        drive(&mut trade, &bars);

        // A trade that closed on its final TP ends bar processing before the
        // stop update runs, so the ladder law applies to every other state.
        prop_assume!(trade
            .result
            .as_ref()
            .map_or(true, |r| r.status != candela_core::trade::TradeStatus::ClosedTp));

        let n = trade.tp_hits.len();
        if n == 0 {
            prop_assert_eq!(trade.current_sl(), initial_sl);
        } else {
            let expected = if n == 1 {
                trade.entry_price
            } else {
                trade.levels.tp_levels[n - 2].price
            };
            prop_assert!((trade.current_sl() - expected).abs() < 1e-9);
        }
    }

    /// A closed trade never mutates again.
    #[test]
    fn closed_trades_are_frozen(bars in bar_stream()) {
        let mut trade = open_trade(Direction::Long, StopMode::Cascade);
        drive(&mut trade, &bars);
        prop_assume!(!trade.is_open());

        let snapshot = trade.clone();
        trade.on_bar(ts(999), 150.0, 50.0, 100.0);
        prop_assert_eq!(trade, snapshot);
    }

    /// Total PnL equals the weighted sum of TP fills plus the remainder
    /// exiting at the exit price.
    #[test]
    fn pnl_accounting_is_position_weighted(bars in bar_stream(), long in any::<bool>()) {
        let direction = if long { Direction::Long } else { Direction::Short };
        let mut trade = open_trade(direction, StopMode::Cascade);
        drive(&mut trade, &bars);

        let result = trade.close_manual(ts(1_000), 100.4);
        let tp_part: f64 = result
            .tp_hits
            .iter()
            .map(|h| h.pnl_percent * h.closed_fraction / 100.0)
            .sum();
        let exit_pnl = match direction {
            Direction::Long => (result.exit_price - 100.0) / 100.0 * 100.0,
            Direction::Short => (100.0 - result.exit_price) / 100.0 * 100.0,
        };
        let expected = tp_part + exit_pnl * trade.remaining / 100.0;
        prop_assert!(result.total_pnl_percent.is_finite());
        prop_assert!((result.total_pnl_percent - expected).abs() < 1e-9);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Re-running the engine on identical inputs reproduces the trade list
    /// bit for bit.
    #[test]
    fn backtest_is_deterministic(seed in 0u64..1_000) {
        let series = synthetic::random_walk(400, seed);
        let mut config = BacktestConfig::for_preset("BTCUSDT", "1h", 0).unwrap();
        config.preset = Preset::custom(0, 5, 4, 0.1, 0.5, 0.5).unwrap();

        let engine = BacktestEngine::new(config);
        let a = engine.run(&series).unwrap();
        let b = engine.run(&series).unwrap();
        prop_assert_eq!(a.trades, b.trades);
        prop_assert_eq!(a.metrics, b.metrics);
    }

    /// The engine holds at most one open trade: entries never precede the
    /// previous exit, and only the last trade may close at the final bar.
    #[test]
    fn single_open_trade(seed in 0u64..1_000) {
        let series = synthetic::random_walk(400, seed);
        let mut config = BacktestConfig::for_preset("BTCUSDT", "1h", 0).unwrap();
        config.preset = Preset::custom(0, 5, 4, 0.1, 0.5, 0.5).unwrap();

        let result = BacktestEngine::new(config).run(&series).unwrap();
        for trade in &result.trades {
            prop_assert!(trade.result.is_some());
        }
        for pair in result.trades.windows(2) {
            let prev_exit = pair[0].result.as_ref().unwrap().exit_timestamp;
            prop_assert!(pair[1].entry_timestamp >= prev_exit);
        }
    }
}

proptest! {
    /// The serialized signal block parses back to the original fields
    /// (prices up to the formatted precision).
    #[test]
    fn signal_text_round_trips(
        entry in 0.01_f64..60_000.0,
        sl_frac in 0.01_f64..0.4,
        tp_count in 1usize..7,
        leverage in 1u32..50,
        long in any::<bool>(),
    ) {
        let side = if long { Direction::Long } else { Direction::Short };
        let sign = if long { 1.0 } else { -1.0 };
        let take_profits: Vec<f64> = (1..=tp_count)
            .map(|k| entry * (1.0 + sign * 0.01 * k as f64))
            .collect();
        let message = SignalMessage {
            symbol: "BTCUSDT".to_string(),
            side,
            leverage,
            entry_price: entry,
            take_profits,
            stop_loss: entry * (1.0 - sign * sl_frac),
        };
        message.validate().unwrap();

        let parsed = parse_signal(&format_new_signal(&message)).unwrap();
        prop_assert_eq!(&parsed.symbol, "BTCUSDT");
        prop_assert_eq!(parsed.side, side);
        prop_assert_eq!(parsed.leverage, leverage);
        prop_assert_eq!(parsed.take_profits.len(), tp_count);

        // Precision tolerance from the magnitude-dependent formatting.
        let tolerance = |p: f64| {
            if p >= 10_000.0 { 0.051 } else if p >= 100.0 { 0.0051 }
            else if p >= 1.0 { 0.000051 } else { 0.00000051 }
        };
        prop_assert!((parsed.entry_price - entry).abs() <= tolerance(entry));
        prop_assert!((parsed.stop_loss - message.stop_loss).abs() <= tolerance(message.stop_loss));
        for (a, b) in parsed.take_profits.iter().zip(&message.take_profits) {
            prop_assert!((a - b).abs() <= tolerance(*b));
        }
    }
}
