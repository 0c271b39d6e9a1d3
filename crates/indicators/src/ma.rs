//! Batch moving-average kernels.
//!
//! Every kernel returns a series as long as its input, with `f64::NAN` in the
//! warmup positions (`0..period - 1`).
//!
//! The finite-window methods (simple, linear-weighted) evaluate each window
//! from scratch, so the value at a position depends only on the `period`
//! inputs ending there. Running one over a trailing slice of a series gives
//! bit-identical results to running it over the full series. Exponential and
//! smoothed averages carry state from the start of their input.

use serde::{Deserialize, Serialize};

/// Moving-average weighting scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaMethod {
    Simple,
    Exponential,
    /// Wilder's smoothing, `alpha = 1 / period`.
    Smoothed,
    LinearWeighted,
}

impl MaMethod {
    /// True when the value at a position only depends on the last `period` inputs.
    pub fn is_finite_window(self) -> bool {
        matches!(self, MaMethod::Simple | MaMethod::LinearWeighted)
    }

    /// Next value of a recursive average from the previous one.
    ///
    /// `None` for the finite-window methods, which have no running state.
    pub fn step(self, prev: f64, value: f64, period: usize) -> Option<f64> {
        match self {
            MaMethod::Exponential => Some(ema_step(prev, value, period)),
            MaMethod::Smoothed => Some(smma_step(prev, value, period)),
            MaMethod::Simple | MaMethod::LinearWeighted => None,
        }
    }
}

impl std::fmt::Display for MaMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MaMethod::Simple => "simple",
            MaMethod::Exponential => "exponential",
            MaMethod::Smoothed => "smoothed",
            MaMethod::LinearWeighted => "linear_weighted",
        };
        f.write_str(name)
    }
}

/// Moving average of `values` with the given method.
pub fn moving_average(values: &[f64], period: usize, method: MaMethod) -> Vec<f64> {
    match method {
        MaMethod::Simple => sma(values, period),
        MaMethod::Exponential => ema(values, period),
        MaMethod::Smoothed => smma(values, period),
        MaMethod::LinearWeighted => lwma(values, period),
    }
}

/// Simple moving average.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    assert!(period > 0, "SMA period must be > 0");
    let divisor = period as f64;
    finite_window(values, period, |window| window.iter().sum::<f64>() / divisor)
}

/// Linear-weighted moving average: the newest input has weight `period`,
/// the oldest weight 1.
pub fn lwma(values: &[f64], period: usize) -> Vec<f64> {
    assert!(period > 0, "LWMA period must be > 0");
    let weight_sum = (period * (period + 1) / 2) as f64;
    finite_window(values, period, |window| {
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(j, v)| v * (j + 1) as f64)
            .sum();
        weighted / weight_sum
    })
}

/// Exponential moving average, seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    assert!(period > 0, "EMA period must be > 0");
    seeded(values, period, |prev, value| ema_step(prev, value, period))
}

/// Smoothed (Wilder) moving average, seeded with the SMA of the first `period` values.
pub fn smma(values: &[f64], period: usize) -> Vec<f64> {
    assert!(period > 0, "SMMA period must be > 0");
    seeded(values, period, |prev, value| smma_step(prev, value, period))
}

fn ema_step(prev: f64, value: f64, period: usize) -> f64 {
    let multiplier = 2.0 / (period as f64 + 1.0);
    (value - prev) * multiplier + prev
}

fn smma_step(prev: f64, value: f64, period: usize) -> f64 {
    let n = period as f64;
    (prev * (n - 1.0) + value) / n
}

fn finite_window(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for (i, window) in values.windows(period).enumerate() {
        out[i + period - 1] = f(window);
    }
    out
}

fn seeded(values: &[f64], period: usize, step: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if values.len() < period {
        return out;
    }
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = current;
    for (i, value) in values.iter().enumerate().skip(period) {
        current = step(current, *value);
        out[i] = current;
    }
    out
}
