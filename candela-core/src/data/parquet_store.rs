//! Parquet-backed candle store.
//!
//! Layout: `{root}/{SYMBOL}_{interval}.parquet`, one file per pair. Columns
//! follow the exchange kline layout: `timestamp(i64 ms), open, high, low,
//! close, volume, close_time(i64 ms), quote_volume, trades(i64),
//! taker_buy_base, taker_buy_quote`. The engine itself only reads the OHLCV
//! subset; the remaining columns are persisted so stored files stay
//! interchangeable with other consumers of the format.
//!
//! Writes are atomic: write to `.tmp`, rename into place.

use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{Bar, Interval};
use crate::ports::{CandleStore, PortError};

const COLLABORATOR: &str = "candle_store";

pub struct ParquetCandleStore {
    root: PathBuf,
}

impl ParquetCandleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.root.join(format!("{symbol}_{interval}.parquet"))
    }

    fn write_atomic(&self, df: &DataFrame, path: &Path) -> Result<(), PortError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| PortError::new(COLLABORATOR, "save", e))?;
        let tmp_path = path.with_extension("parquet.tmp");
        let file =
            fs::File::create(&tmp_path).map_err(|e| PortError::new(COLLABORATOR, "save", e))?;
        ParquetWriter::new(file)
            .finish(&mut df.clone())
            .map_err(|e| PortError::new(COLLABORATOR, "save", e))?;
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            PortError::new(COLLABORATOR, "save", e)
        })
    }

    fn read_file(&self, path: &Path) -> Result<Vec<Bar>, PortError> {
        let file = fs::File::open(path).map_err(|e| PortError::new(COLLABORATOR, "load", e))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| PortError::new(COLLABORATOR, "load", e))?;
        dataframe_to_bars(&df)
    }
}

impl CandleStore for ParquetCandleStore {
    fn save(&self, bars: &[Bar], symbol: &str, interval: Interval) -> Result<(), PortError> {
        if bars.is_empty() {
            return Err(PortError::new(COLLABORATOR, "save", "no bars to save"));
        }
        let df = bars_to_dataframe(bars, interval)?;
        self.write_atomic(&df, &self.file_path(symbol, interval))
    }

    fn append(&self, bars: &[Bar], symbol: &str, interval: Interval) -> Result<(), PortError> {
        let path = self.file_path(symbol, interval);
        let mut merged = if path.exists() {
            self.read_file(&path)?
        } else {
            Vec::new()
        };

        // Incoming bars replace stored bars with the same open time.
        for bar in bars {
            match merged.binary_search_by_key(&bar.open_time, |b| b.open_time) {
                Ok(i) => merged[i] = bar.clone(),
                Err(i) => merged.insert(i, bar.clone()),
            }
        }

        if merged.is_empty() {
            return Err(PortError::new(COLLABORATOR, "append", "no bars to append"));
        }
        let df = bars_to_dataframe(&merged, interval)?;
        self.write_atomic(&df, &path)
    }

    fn load(
        &self,
        symbol: &str,
        interval: Interval,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
    ) -> Result<Vec<Bar>, PortError> {
        let path = self.file_path(symbol, interval);
        if !path.exists() {
            return Err(PortError::new(
                COLLABORATOR,
                "load",
                format!("no stored candles for {symbol} {interval}"),
            ));
        }
        let mut bars = self.read_file(&path)?;
        if let Some(start) = start_ms {
            bars.retain(|b| b.open_time >= start);
        }
        if let Some(end) = end_ms {
            bars.retain(|b| b.open_time < end);
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, PortError> {
        let mut symbols: Vec<String> = self
            .stored_pairs()?
            .into_iter()
            .map(|(symbol, _)| symbol)
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn list_intervals(&self, symbol: &str) -> Result<Vec<Interval>, PortError> {
        let mut intervals: Vec<Interval> = self
            .stored_pairs()?
            .into_iter()
            .filter(|(s, _)| s == symbol)
            .map(|(_, interval)| interval)
            .collect();
        intervals.sort_by_key(|iv| iv.millis());
        Ok(intervals)
    }
}

impl ParquetCandleStore {
    fn stored_pairs(&self) -> Result<Vec<(String, Interval)>, PortError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&self.root).map_err(|e| PortError::new(COLLABORATOR, "list", e))?;
        let mut pairs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PortError::new(COLLABORATOR, "list", e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(stem) = name.strip_suffix(".parquet") else {
                continue;
            };
            let Some((symbol, interval)) = stem.rsplit_once('_') else {
                continue;
            };
            if let Ok(interval) = interval.parse::<Interval>() {
                pairs.push((symbol.to_string(), interval));
            }
        }
        Ok(pairs)
    }
}

fn bars_to_dataframe(bars: &[Bar], interval: Interval) -> Result<DataFrame, PortError> {
    let timestamps: Vec<i64> = bars.iter().map(|b| b.open_time).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let close_times: Vec<i64> = bars
        .iter()
        .map(|b| b.open_time + interval.millis() - 1)
        .collect();
    // The engine does not consume these; persisted as zeros so the schema
    // matches the full kline layout.
    let zeros_f64 = vec![0.0_f64; bars.len()];
    let zeros_i64 = vec![0_i64; bars.len()];

    DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("close_time".into(), close_times),
        Column::new("quote_volume".into(), zeros_f64.clone()),
        Column::new("trades".into(), zeros_i64),
        Column::new("taker_buy_base".into(), zeros_f64.clone()),
        Column::new("taker_buy_quote".into(), zeros_f64),
    ])
    .map_err(|e| PortError::new(COLLABORATOR, "save", e))
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, PortError> {
    let map_err = |e: PolarsError| PortError::new(COLLABORATOR, "load", e);

    let timestamps = df.column("timestamp").map_err(map_err)?.i64().map_err(map_err)?;
    let opens = df.column("open").map_err(map_err)?.f64().map_err(map_err)?;
    let highs = df.column("high").map_err(map_err)?.f64().map_err(map_err)?;
    let lows = df.column("low").map_err(map_err)?.f64().map_err(map_err)?;
    let closes = df.column("close").map_err(map_err)?.f64().map_err(map_err)?;
    let volumes = df.column("volume").map_err(map_err)?.f64().map_err(map_err)?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let open_time = timestamps
            .get(i)
            .ok_or_else(|| PortError::new(COLLABORATOR, "load", format!("null timestamp at row {i}")))?;
        bars.push(Bar {
            open_time,
            open: opens.get(i).unwrap_or(f64::NAN),
            high: highs.get(i).unwrap_or(f64::NAN),
            low: lows.get(i).unwrap_or(f64::NAN),
            close: closes.get(i).unwrap_or(f64::NAN),
            volume: volumes.get(i).unwrap_or(f64::NAN),
        });
    }
    Ok(bars)
}
