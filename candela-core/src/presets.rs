//! The canonical 60-row indicator parameter table.
//!
//! Each preset selects the channel lookback (`i1`), the stddev lookback
//! (`i2`), and the three trigger multipliers (`i3` stddev, `i4` ATR, `i5`
//! midpoint offset percent). Rows 0..=25 are the base set, 26..=59 the
//! extension. The table is fixed; presets are never mutated at runtime.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One indicator parameterization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Position in the canonical table (0..=59).
    pub index: usize,
    /// Channel lookback in bars (highest high / lowest low).
    pub i1: usize,
    /// Stddev lookback in bars.
    pub i2: usize,
    /// Stddev multiplier.
    pub i3: f64,
    /// ATR multiplier.
    pub i4: f64,
    /// Midpoint offset, percent.
    pub i5: f64,
}

impl Preset {
    /// Look up a canonical preset by table index.
    pub fn by_index(index: usize) -> Result<&'static Preset, CoreError> {
        PRESETS
            .get(index)
            .ok_or_else(|| CoreError::invalid(format!("preset index {index} out of 0..=59")))
    }

    /// A preset with custom parameters, carrying the table index of the
    /// preset it was derived from. Used by the robustness neighbor sweep.
    pub fn custom(index: usize, i1: usize, i2: usize, i3: f64, i4: f64, i5: f64) -> Result<Preset, CoreError> {
        if index >= PRESETS.len() {
            return Err(CoreError::invalid(format!("preset index {index} out of 0..=59")));
        }
        if i1 < 1 {
            return Err(CoreError::invalid(format!("i1 must be >= 1, got {i1}")));
        }
        if i2 < 1 {
            return Err(CoreError::invalid(format!("i2 must be >= 1, got {i2}")));
        }
        Ok(Preset { index, i1, i2, i3, i4, i5 })
    }

    /// Minimum number of bars the indicator needs under this preset.
    pub fn min_bars(&self) -> usize {
        self.i1.max(self.i2).max(crate::channel::ATR_PERIOD)
    }
}

const fn preset(index: usize, i1: usize, i2: usize, i3: f64, i4: f64, i5: f64) -> Preset {
    Preset { index, i1, i2, i3, i4, i5 }
}

/// The canonical table. Index i holds the preset with `index == i`.
#[rustfmt::skip]
pub const PRESETS: [Preset; 60] = [
    preset( 0,  40, 10, 0.30, 1.00, 1.00),
    preset( 1,  50, 11, 0.40, 1.10, 1.10),
    preset( 2,  55, 12, 0.50, 1.20, 1.20),
    preset( 3,  60, 14, 0.60, 1.30, 1.30),
    preset( 4,  65, 14, 0.80, 1.40, 1.40),
    preset( 5,  70, 14, 0.90, 1.50, 1.50),
    preset( 6,  80, 14, 1.00, 1.60, 1.60),
    preset( 7,  90, 15, 1.10, 1.70, 1.70),
    preset( 8,  60, 16, 1.20, 1.50, 1.50),
    preset( 9,  55, 16, 1.30, 1.60, 1.60),
    preset(10,  50, 15, 1.40, 1.70, 1.70),
    preset(11,  45, 16, 1.50, 1.80, 1.80),
    preset(12,  40, 15, 1.60, 1.80, 1.80),
    preset(13,  35, 15, 1.60, 1.90, 1.90),
    preset(14,  30, 14, 1.70, 2.00, 1.50),
    preset(15, 150, 14, 1.80, 2.20, 1.30),
    preset(16, 150, 14, 2.00, 2.40, 1.50),
    preset(17, 200, 14, 2.10, 2.60, 1.80),
    preset(18,  40, 13, 1.10, 1.00, 1.00),
    preset(19, 200, 14, 1.20, 1.60, 2.10),
    preset(20, 200, 14, 1.40, 1.80, 2.40),
    preset(21, 200, 14, 1.60, 2.00, 2.00),
    preset(22,  30, 14, 2.30, 2.60, 2.60),
    preset(23,  20, 14, 2.50, 3.00, 3.00),
    preset(24,  40, 14, 2.70, 3.20, 3.20),
    preset(25,  15, 14, 3.00, 3.50, 3.50),
    preset(26, 100, 14, 1.05, 1.75, 1.75),
    preset(27, 110, 14, 1.15, 1.85, 1.85),
    preset(28, 120, 14, 1.25, 1.95, 1.75),
    preset(29, 130, 14, 1.35, 2.05, 1.65),
    preset(30, 140, 14, 1.45, 2.15, 1.55),
    preset(31, 160, 14, 1.55, 2.25, 1.45),
    preset(32, 180, 14, 1.65, 2.35, 1.55),
    preset(33, 100, 16, 1.35, 1.90, 1.90),
    preset(34,  80, 12, 0.65, 1.40, 1.25),
    preset(35,  75, 13, 0.75, 1.50, 1.35),
    preset(36,  65, 12, 0.55, 1.35, 1.15),
    preset(37,  55, 13, 1.00, 1.55, 1.55),
    preset(38,  25, 13, 2.00, 2.40, 2.20),
    preset(39,  18, 12, 2.70, 3.10, 3.00),
    preset(40,  10,  8, 0.20, 0.90, 0.80),
    preset(41,  12,  9, 0.25, 1.00, 1.00),
    preset(42,  15, 10, 0.35, 1.15, 1.20),
    preset(43,  20, 12, 0.45, 1.25, 1.40),
    preset(44,  25, 14, 0.60, 1.40, 1.60),
    preset(45,  30, 16, 0.70, 1.55, 1.80),
    preset(46,  35, 18, 0.85, 1.70, 2.00),
    preset(47,  75, 20, 1.10, 1.85, 2.20),
    preset(48,  95, 21, 1.30, 2.00, 2.40),
    preset(49, 180, 22, 1.60, 2.20, 2.60),
    preset(50, 220, 18, 1.90, 2.40, 2.80),
    preset(51, 250, 20, 2.20, 2.60, 3.00),
    preset(52, 300, 14, 2.60, 2.90, 3.20),
    preset(53, 320, 16, 2.90, 3.10, 3.50),
    preset(54, 350, 12, 3.20, 3.30, 3.80),
    preset(55, 400,  8, 3.50, 3.50, 4.00),
    preset(56, 450, 18, 4.00, 4.00, 4.20),
    preset(57, 500, 20, 1.05, 1.35, 1.50),
    preset(58, 260, 10, 0.55, 1.60, 2.10),
    preset(59, 280, 14, 2.40, 2.80, 3.60),
];
