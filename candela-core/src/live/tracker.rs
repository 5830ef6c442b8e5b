//! Live tracker — the trade state machine applied to streaming bars.
//!
//! One worker thread per symbol, fed by a bounded command channel; the
//! channel is the serialization point, so events for a symbol are totally
//! ordered by bar time while distinct symbols run concurrently. A stop flag
//! is observed at the top of the worker loop; an in-flight bar always
//! completes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, Sender, SyncSender};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::Direction;
use crate::error::CoreError;
use crate::trade::{Trade, TradeResult, TradeStatus};

/// Command channel depth per symbol; senders block when a worker lags.
const COMMAND_QUEUE_DEPTH: usize = 64;

/// A streaming bar update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEvent {
    pub symbol: String,
    pub timeframe: String,
    /// Bar open time, milliseconds since epoch (UTC).
    pub open_time: i64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// False while the bar is still forming.
    pub is_closed: bool,
}

impl BarEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.open_time)
            .single()
            .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
    }
}

/// What happened to a tracked position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingEventKind {
    Opened {
        direction: Direction,
        entry_price: f64,
    },
    TpHit {
        level: usize,
        price: f64,
        pnl_percent: f64,
        closed_fraction: f64,
        remaining: f64,
    },
    SlMoved {
        old: f64,
        new: f64,
    },
    Breakeven {
        price: f64,
    },
    Closed {
        status: TradeStatus,
        close_price: f64,
        total_pnl_percent: f64,
    },
}

/// An event emitted by the tracker for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub kind: TrackingEventKind,
}

#[derive(Debug)]
enum SymbolCommand {
    Bar(BarEvent),
    Open(Box<Trade>),
    CloseManual { price: f64, at: DateTime<Utc> },
    Shutdown,
}

struct SymbolWorker {
    tx: SyncSender<SymbolCommand>,
    handle: JoinHandle<()>,
}

/// The tracker. Create with [`LiveTracker::new`], which also hands back the
/// event receiver.
pub struct LiveTracker {
    workers: Mutex<HashMap<String, SymbolWorker>>,
    events_tx: Sender<TrackingEvent>,
    stop: Arc<AtomicBool>,
}

impl LiveTracker {
    pub fn new() -> (Self, Receiver<TrackingEvent>) {
        let (events_tx, events_rx) = mpsc::channel();
        (
            Self {
                workers: Mutex::new(HashMap::new()),
                events_tx,
                stop: Arc::new(AtomicBool::new(false)),
            },
            events_rx,
        )
    }

    /// Hand an admitted trade to the symbol's worker, spawning it on first
    /// use. Admissibility (signal freshness, exposure limits) is the
    /// caller's decision.
    pub fn open_trade(&self, trade: Trade) -> Result<(), CoreError> {
        let symbol = trade.symbol.clone();
        self.send(&symbol, SymbolCommand::Open(Box::new(trade)), true)
    }

    /// Route a streaming bar to its symbol's worker. Bars for symbols
    /// without a worker are dropped.
    pub fn on_bar(&self, event: BarEvent) -> Result<(), CoreError> {
        let symbol = event.symbol.clone();
        self.send(&symbol, SymbolCommand::Bar(event), false)
    }

    /// Close the symbol's open trade at the given price.
    pub fn close_manual(&self, symbol: &str, price: f64) -> Result<(), CoreError> {
        self.send(
            symbol,
            SymbolCommand::CloseManual {
                price,
                at: Utc::now(),
            },
            false,
        )
    }

    /// Symbols that currently have a worker.
    pub fn symbols(&self) -> Vec<String> {
        let workers = self.workers.lock().expect("tracker lock poisoned");
        let mut symbols: Vec<String> = workers.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Request a stop and join every worker. In-flight bar evaluations
    /// complete; queued commands behind the stop are discarded.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        let mut workers = self.workers.lock().expect("tracker lock poisoned");
        for (_, worker) in workers.iter() {
            let _ = worker.tx.send(SymbolCommand::Shutdown);
        }
        for (symbol, worker) in workers.drain() {
            if worker.handle.join().is_err() {
                warn!(symbol, "tracker worker panicked during shutdown");
            }
        }
    }

    fn send(&self, symbol: &str, command: SymbolCommand, spawn: bool) -> Result<(), CoreError> {
        let mut workers = self.workers.lock().expect("tracker lock poisoned");
        if !workers.contains_key(symbol) {
            if !spawn {
                // No position being tracked for this symbol; nothing to do.
                return Ok(());
            }
            let worker = spawn_worker(symbol, self.events_tx.clone(), Arc::clone(&self.stop))?;
            workers.insert(symbol.to_string(), worker);
        }
        let worker = workers.get(symbol).expect("worker just ensured");
        worker
            .tx
            .send(command)
            .map_err(|e| CoreError::external("live_tracker", "dispatch", e))
    }
}

fn spawn_worker(
    symbol: &str,
    events: Sender<TrackingEvent>,
    stop: Arc<AtomicBool>,
) -> Result<SymbolWorker, CoreError> {
    let (tx, rx) = sync_channel::<SymbolCommand>(COMMAND_QUEUE_DEPTH);
    let name = format!("candela-track-{symbol}");
    let symbol = symbol.to_string();
    let handle = std::thread::Builder::new()
        .name(name)
        .spawn(move || worker_loop(&symbol, rx, events, stop))
        .map_err(|e| CoreError::external("live_tracker", "spawn", e))?;
    Ok(SymbolWorker { tx, handle })
}

fn worker_loop(
    symbol: &str,
    rx: Receiver<SymbolCommand>,
    events: Sender<TrackingEvent>,
    stop: Arc<AtomicBool>,
) {
    let mut open_trade: Option<Trade> = None;
    let mut current_price = f64::NAN;

    while let Ok(command) = rx.recv() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        match command {
            SymbolCommand::Open(trade) => {
                if open_trade.as_ref().is_some_and(|t| t.is_open()) {
                    warn!(symbol, "rejecting open: a trade is already tracked");
                    continue;
                }
                info!(
                    symbol,
                    direction = %trade.direction,
                    entry = trade.entry_price,
                    "tracking new trade"
                );
                let _ = events.send(TrackingEvent {
                    symbol: symbol.to_string(),
                    timestamp: trade.entry_timestamp,
                    kind: TrackingEventKind::Opened {
                        direction: trade.direction,
                        entry_price: trade.entry_price,
                    },
                });
                open_trade = Some(*trade);
            }
            SymbolCommand::Bar(bar) => {
                if !bar.is_closed {
                    current_price = bar.close;
                    continue;
                }
                current_price = bar.close;
                let Some(trade) = open_trade.as_mut() else {
                    continue;
                };
                let timestamp = bar.timestamp();
                let update = trade.on_bar(timestamp, bar.high, bar.low, bar.close);
                emit_bar_events(symbol, trade, timestamp, &update, &events);
                if update.result.is_some() {
                    open_trade = None;
                }
            }
            SymbolCommand::CloseManual { price, at } => {
                let Some(trade) = open_trade.as_mut() else {
                    continue;
                };
                let result = trade.close_manual(at, price);
                emit_close(symbol, at, &result, &events);
                open_trade = None;
            }
            SymbolCommand::Shutdown => break,
        }
    }

    debug!(symbol, current_price, "tracker worker exiting");
}

fn emit_bar_events(
    symbol: &str,
    trade: &Trade,
    timestamp: DateTime<Utc>,
    update: &crate::trade::BarUpdate,
    events: &Sender<TrackingEvent>,
) {
    for hit in &update.tp_hits {
        debug!(symbol, level = hit.index, price = hit.price, "TP hit");
        let _ = events.send(TrackingEvent {
            symbol: symbol.to_string(),
            timestamp,
            kind: TrackingEventKind::TpHit {
                level: hit.index,
                price: hit.price,
                pnl_percent: hit.pnl_percent,
                closed_fraction: hit.closed_fraction,
                remaining: trade.remaining,
            },
        });
    }

    if let Some(sl_move) = update.sl_move {
        debug!(symbol, old = sl_move.old, new = sl_move.new, "stop moved");
        let kind = if sl_move.breakeven {
            TrackingEventKind::Breakeven { price: sl_move.new }
        } else {
            TrackingEventKind::SlMoved {
                old: sl_move.old,
                new: sl_move.new,
            }
        };
        let _ = events.send(TrackingEvent {
            symbol: symbol.to_string(),
            timestamp,
            kind,
        });
    }

    if let Some(result) = &update.result {
        emit_close(symbol, timestamp, result, events);
    }
}

fn emit_close(
    symbol: &str,
    timestamp: DateTime<Utc>,
    result: &TradeResult,
    events: &Sender<TrackingEvent>,
) {
    info!(
        symbol,
        status = ?result.status,
        pnl = result.total_pnl_percent,
        "trade closed"
    );
    let _ = events.send(TrackingEvent {
        symbol: symbol.to_string(),
        timestamp,
        kind: TrackingEventKind::Closed {
            status: result.status,
            close_price: result.exit_price,
            total_pnl_percent: result.total_pnl_percent,
        },
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpsl::TpSlConfig;
    use std::time::Duration;

    fn make_trade(symbol: &str, entry: f64, direction: Direction) -> Trade {
        let config = TpSlConfig::default();
        let levels = config.build_levels(entry, direction, None);
        Trade::open(
            symbol,
            "1h",
            0,
            Utc.timestamp_millis_opt(0).unwrap(),
            levels,
            &config,
        )
    }

    fn bar(symbol: &str, open_time: i64, high: f64, low: f64, close: f64, closed: bool) -> BarEvent {
        BarEvent {
            symbol: symbol.to_string(),
            timeframe: "1h".to_string(),
            open_time,
            high,
            low,
            close,
            is_closed: closed,
        }
    }

    /// Collect events until the first Closed event (inclusive).
    fn drain(rx: &Receiver<TrackingEvent>) -> Vec<TrackingEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
            let done = matches!(event.kind, TrackingEventKind::Closed { .. });
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[test]
    fn tp_then_cascade_then_close_event_order() {
        let (tracker, rx) = LiveTracker::new();
        tracker
            .open_trade(make_trade("BTCUSDT", 100.0, Direction::Long))
            .unwrap();

        // TP1 then the same bar's low trips the cascaded stop at entry.
        tracker
            .on_bar(bar("BTCUSDT", 3_600_000, 101.2, 91.8, 92.0, true))
            .unwrap();

        let events = drain(&rx);
        let kinds: Vec<&TrackingEventKind> = events.iter().map(|e| &e.kind).collect();

        assert!(matches!(kinds[0], TrackingEventKind::Opened { .. }));
        assert!(
            matches!(kinds[1], TrackingEventKind::TpHit { level: 1, .. }),
            "got {kinds:?}"
        );
        assert!(matches!(kinds[2], TrackingEventKind::Breakeven { .. }));
        match kinds[3] {
            TrackingEventKind::Closed {
                status,
                close_price,
                total_pnl_percent,
            } => {
                assert_eq!(*status, TradeStatus::ClosedSl);
                assert!((close_price - 100.0).abs() < 1e-9);
                assert!((total_pnl_percent - 0.17).abs() < 1e-9);
            }
            other => panic!("expected Closed, got {other:?}"),
        }

        tracker.shutdown();
    }

    #[test]
    fn forming_bars_do_not_touch_the_trade() {
        let (tracker, rx) = LiveTracker::new();
        tracker
            .open_trade(make_trade("BTCUSDT", 100.0, Direction::Long))
            .unwrap();

        // A forming bar through TP1 must not fill anything.
        tracker
            .on_bar(bar("BTCUSDT", 3_600_000, 102.0, 99.5, 101.5, false))
            .unwrap();
        // The closed version of a quiet bar follows.
        tracker
            .on_bar(bar("BTCUSDT", 3_600_000, 100.5, 99.5, 100.0, true))
            .unwrap();
        tracker.close_manual("BTCUSDT", 100.0).unwrap();

        let events = drain(&rx);
        assert!(events
            .iter()
            .all(|e| !matches!(e.kind, TrackingEventKind::TpHit { .. })));
        assert!(matches!(
            events.last().map(|e| &e.kind),
            Some(TrackingEventKind::Closed {
                status: TradeStatus::ClosedManual,
                ..
            })
        ));

        tracker.shutdown();
    }

    #[test]
    fn symbols_are_independent() {
        let (tracker, rx) = LiveTracker::new();
        tracker
            .open_trade(make_trade("BTCUSDT", 100.0, Direction::Long))
            .unwrap();
        tracker
            .open_trade(make_trade("ETHUSDT", 200.0, Direction::Short))
            .unwrap();
        assert_eq!(tracker.symbols(), vec!["BTCUSDT", "ETHUSDT"]);

        // Stop out only the ETH short (high through its stop at 217).
        tracker
            .on_bar(bar("ETHUSDT", 3_600_000, 218.0, 201.0, 217.5, true))
            .unwrap();

        let mut closed_symbols = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
            if matches!(event.kind, TrackingEventKind::Closed { .. }) {
                closed_symbols.push(event.symbol.clone());
                break;
            }
        }
        assert_eq!(closed_symbols, vec!["ETHUSDT"]);

        tracker.shutdown();
    }

    #[test]
    fn bars_for_unknown_symbols_are_dropped() {
        let (tracker, _rx) = LiveTracker::new();
        tracker
            .on_bar(bar("SOLUSDT", 0, 10.0, 9.0, 9.5, true))
            .unwrap();
        assert!(tracker.symbols().is_empty());
        tracker.shutdown();
    }

    #[test]
    fn double_open_is_rejected() {
        let (tracker, rx) = LiveTracker::new();
        tracker
            .open_trade(make_trade("BTCUSDT", 100.0, Direction::Long))
            .unwrap();
        tracker
            .open_trade(make_trade("BTCUSDT", 101.0, Direction::Short))
            .unwrap();
        tracker.close_manual("BTCUSDT", 100.0).unwrap();

        let events = drain(&rx);
        let opened = events
            .iter()
            .filter(|e| matches!(e.kind, TrackingEventKind::Opened { .. }))
            .count();
        assert_eq!(opened, 1);
        // The close reflects the first trade's entry.
        match &events.last().unwrap().kind {
            TrackingEventKind::Closed { close_price, .. } => {
                assert!((close_price - 100.0).abs() < 1e-9)
            }
            other => panic!("expected Closed, got {other:?}"),
        }

        tracker.shutdown();
    }
}
