//! Incremental indicator-value caches for chart overlays.
//!
//! Each engine lazily computes the value at a bar index on request, caches
//! it, and after a bulk pass over the initial history only recomputes a
//! bounded window when bars are appended or the last bar is revised.

pub mod cache;
pub mod config;
pub mod error;
pub mod label;
pub mod ma;
pub mod rsi;
pub mod sma;
pub mod vqi;
pub mod window;

#[cfg(test)]
pub(crate) mod test_util;

pub use cache::{CacheState, Slot, ValueCache};
pub use config::IndicatorSettings;
pub use error::IndicatorError;
pub use ma::MaMethod;
pub use rsi::{RsiConfig, RsiIndicator};
pub use sma::{SmaConfig, SmaIndicator};
pub use vqi::{VqiConfig, VqiIndicator};

use barlens_core::BarSource;

/// What a chart layer needs from an indicator.
///
/// The source is borrowed per call; an indicator never mutates bars.
pub trait ChartIndicator: Send + Sync {
    /// Short display name (e.g. "RSI").
    fn name(&self) -> &str;

    /// Value at bar `ix`, computing and caching it when needed.
    ///
    /// Indices below the indicator's lookback return its sentinel. Indices
    /// past the last bar are an error.
    fn value_at(&mut self, source: &dyn BarSource, ix: isize) -> Result<f64, IndicatorError>;

    /// Info text for bar `ix`, from cached values only.
    fn label_text(&self, ix: isize) -> String;

    /// Drop every cached value.
    fn clear_all(&mut self);

    fn state(&self) -> CacheState;

    /// Cached value at `ix`, without computing anything.
    fn cached(&self, ix: usize) -> Option<f64>;

    /// Endpoints of the line from `ix - 1` to `ix`, `None` when either is undefined.
    fn line_segment(
        &mut self,
        source: &dyn BarSource,
        ix: isize,
    ) -> Result<Option<(f64, f64)>, IndicatorError> {
        let current = self.value_at(source, ix)?;
        let previous = self.value_at(source, ix - 1)?;
        if previous.is_nan() || current.is_nan() {
            Ok(None)
        } else {
            Ok(Some((previous, current)))
        }
    }
}
