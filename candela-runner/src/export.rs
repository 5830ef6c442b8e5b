//! CSV artifacts — trade lists and grid-search rows.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::engine::BacktestResult;
use crate::optimizer::GridSearchResult;

/// Write a backtest's closed trades as CSV.
pub fn write_trades_csv<W: Write>(result: &BacktestResult, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "id",
        "symbol",
        "timeframe",
        "direction",
        "entry_time_ms",
        "entry_price",
        "exit_time_ms",
        "exit_price",
        "status",
        "tp_hits",
        "pnl_percent",
        "duration_bars",
        "max_profit_percent",
        "max_adverse_percent",
    ])
    .context("trade CSV header")?;

    for trade in result.closed_trades() {
        let r = trade.result.as_ref().expect("closed trade has a result");
        csv.write_record([
            trade.id.clone(),
            trade.symbol.clone(),
            trade.timeframe.clone(),
            trade.direction.to_string(),
            trade.entry_timestamp.timestamp_millis().to_string(),
            trade.entry_price.to_string(),
            r.exit_timestamp.timestamp_millis().to_string(),
            r.exit_price.to_string(),
            format!("{:?}", r.status).to_lowercase(),
            r.tp_hits.len().to_string(),
            format!("{:.6}", r.total_pnl_percent),
            r.duration_bars.to_string(),
            format!("{:.6}", r.max_profit_percent),
            format!("{:.6}", r.max_drawdown_percent),
        ])
        .context("trade CSV row")?;
    }

    csv.flush().context("trade CSV flush")?;
    Ok(())
}

/// Write a backtest's closed trades to a file.
pub fn save_trades_csv(result: &BacktestResult, path: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())
        .with_context(|| format!("creating {}", path.as_ref().display()))?;
    write_trades_csv(result, file)
}

/// Write grid-search rows (one per preset) as CSV, in preset order.
pub fn write_grid_csv<W: Write>(result: &GridSearchResult, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "preset_index",
        "i1",
        "i2",
        "i3",
        "i4",
        "i5",
        "trades",
        "win_rate",
        "win_rate_tp1",
        "sharpe",
        "profit_factor",
        "max_drawdown",
        "total_pnl",
        "is_valid",
        "composite_score",
        "invalid_reasons",
    ])
    .context("grid CSV header")?;

    for row in &result.all_results {
        let m = &row.metrics;
        csv.write_record([
            row.preset.index.to_string(),
            row.preset.i1.to_string(),
            row.preset.i2.to_string(),
            row.preset.i3.to_string(),
            row.preset.i4.to_string(),
            row.preset.i5.to_string(),
            m.total_trades.to_string(),
            format!("{:.2}", m.win_rate),
            format!("{:.2}", m.win_rate_tp1()),
            format!("{:.2}", m.sharpe_ratio),
            format!("{:.2}", m.profit_factor),
            format!("{:.2}", m.max_drawdown_percent),
            format!("{:.2}", m.total_pnl_percent),
            row.is_valid.to_string(),
            format!("{:.2}", row.composite_score),
            row.invalid_reasons.join("; "),
        ])
        .context("grid CSV row")?;
    }

    csv.flush().context("grid CSV flush")?;
    Ok(())
}

/// Write grid-search rows to a file.
pub fn save_grid_csv(result: &GridSearchResult, path: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())
        .with_context(|| format!("creating {}", path.as_ref().display()))?;
    write_grid_csv(result, file)
}
