//! Indicator kernels — pure functions over column slices.
//!
//! Every kernel returns a `Vec<f64>` aligned with its input, with `NaN` in
//! warmup positions. Downstream code treats `NaN` as "no value yet" and skips
//! the bar.

pub mod adx;
pub mod rolling;
pub mod rsi;
pub mod smooth;

pub use adx::adx;
pub use rolling::{rolling_max, rolling_mean, rolling_min, rolling_std};
pub use rsi::rsi;
pub use smooth::{true_range, wilder_smooth};

#[cfg(test)]
pub(crate) const DEFAULT_EPSILON: f64 = 1e-9;

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "expected {expected}, got {actual}"
    );
}
