//! CandleSeries — struct-of-arrays OHLCV container.
//!
//! Bar-loop code indexes columns directly instead of re-slicing bar structs;
//! indicator kernels take `&[f64]` column views.

use serde::{Deserialize, Serialize};

use super::Bar;
use crate::error::CoreError;

/// OHLCV series in column-major layout, ordered by ascending `open_time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    /// Milliseconds since epoch (UTC), strictly increasing.
    pub open_time: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl CandleSeries {
    /// Build a series from bars, validating column completeness and ordering.
    pub fn from_bars(bars: &[Bar]) -> Result<Self, CoreError> {
        let mut series = CandleSeries {
            open_time: Vec::with_capacity(bars.len()),
            open: Vec::with_capacity(bars.len()),
            high: Vec::with_capacity(bars.len()),
            low: Vec::with_capacity(bars.len()),
            close: Vec::with_capacity(bars.len()),
            volume: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            series.push(bar);
        }
        series.validate()?;
        Ok(series)
    }

    /// Build directly from columns. All columns must have equal length.
    pub fn from_columns(
        open_time: Vec<i64>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Result<Self, CoreError> {
        let series = CandleSeries {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        };
        series.validate()?;
        Ok(series)
    }

    fn push(&mut self, bar: &Bar) {
        self.open_time.push(bar.open_time);
        self.open.push(bar.open);
        self.high.push(bar.high);
        self.low.push(bar.low);
        self.close.push(bar.close);
        self.volume.push(bar.volume);
    }

    fn validate(&self) -> Result<(), CoreError> {
        let n = self.open_time.len();
        for (name, len) in [
            ("open", self.open.len()),
            ("high", self.high.len()),
            ("low", self.low.len()),
            ("close", self.close.len()),
            ("volume", self.volume.len()),
        ] {
            if len != n {
                return Err(CoreError::invalid(format!(
                    "column {name} has {len} rows, open_time has {n}"
                )));
            }
        }
        if self.open_time.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::invalid(
                "open_time must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.open_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open_time.is_empty()
    }

    /// Bar view at an index.
    pub fn bar(&self, i: usize) -> Bar {
        Bar {
            open_time: self.open_time[i],
            open: self.open[i],
            high: self.high[i],
            low: self.low[i],
            close: self.close[i],
            volume: self.volume[i],
        }
    }

    /// Slice to the half-open bar index range `[start, end)`, clamped.
    pub fn slice(&self, start: usize, end: usize) -> CandleSeries {
        let end = end.min(self.len());
        let start = start.min(end);
        CandleSeries {
            open_time: self.open_time[start..end].to_vec(),
            open: self.open[start..end].to_vec(),
            high: self.high[start..end].to_vec(),
            low: self.low[start..end].to_vec(),
            close: self.close[start..end].to_vec(),
            volume: self.volume[start..end].to_vec(),
        }
    }

    /// Slice to the bars whose open time lies in `[start_ms, end_ms)`.
    /// `None` bounds leave that side open.
    pub fn slice_time(&self, start_ms: Option<i64>, end_ms: Option<i64>) -> CandleSeries {
        let start = match start_ms {
            Some(ms) => self.open_time.partition_point(|&t| t < ms),
            None => 0,
        };
        let end = match end_ms {
            Some(ms) => self.open_time.partition_point(|&t| t < ms),
            None => self.len(),
        };
        self.slice(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn make_series(closes: &[f64]) -> CandleSeries {
        let n = closes.len();
        CandleSeries::from_columns(
            (0..n as i64).map(|i| i * 3_600_000).collect(),
            closes.to_vec(),
            closes.iter().map(|c| c + 1.0).collect(),
            closes.iter().map(|c| c - 1.0).collect(),
            closes.to_vec(),
            vec![1_000.0; n],
        )
        .unwrap()
    }

    #[test]
    fn from_bars_preserves_order() {
        let bars: Vec<Bar> = (0..5)
            .map(|i| Bar {
                open_time: i * 60_000,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: 10.0,
            })
            .collect();
        let series = CandleSeries::from_bars(&bars).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(series.bar(3), bars[3]);
    }

    #[test]
    fn non_monotonic_time_rejected() {
        let result = CandleSeries::from_columns(
            vec![0, 60_000, 60_000],
            vec![1.0; 3],
            vec![1.0; 3],
            vec![1.0; 3],
            vec![1.0; 3],
            vec![1.0; 3],
        );
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn mismatched_columns_rejected() {
        let result = CandleSeries::from_columns(
            vec![0, 60_000],
            vec![1.0; 2],
            vec![1.0; 2],
            vec![1.0; 2],
            vec![1.0], // short close column
            vec![1.0; 2],
        );
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn slice_time_half_open() {
        let series = make_series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let sliced = series.slice_time(Some(3_600_000), Some(3 * 3_600_000));
        assert_eq!(sliced.close, vec![2.0, 3.0]);

        let open_ended = series.slice_time(Some(2 * 3_600_000), None);
        assert_eq!(open_ended.len(), 3);
    }

    #[test]
    fn slice_clamps_out_of_bounds() {
        let series = make_series(&[1.0, 2.0, 3.0]);
        assert_eq!(series.slice(1, 100).len(), 2);
        assert_eq!(series.slice(10, 20).len(), 0);
    }
}
