use crate::cache::{CacheState, ValueCache};
use crate::error::IndicatorError;
use crate::{label, ma, window, ChartIndicator};
use barlens_core::{BarSource, PriceField};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Parameters for [`SmaIndicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaConfig {
    pub window: usize,
    /// Open or close.
    pub price: PriceField,
}

impl Default for SmaConfig {
    fn default() -> Self {
        Self {
            window: 20,
            price: PriceField::Close,
        }
    }
}

/// Simple Moving Average (SMA) overlay.
///
/// Undefined (NaN) for the first `window - 1` bars, `0` for negative indices.
#[derive(Debug, Clone)]
pub struct SmaIndicator {
    config: SmaConfig,
    cache: ValueCache<f64>,
}

impl SmaIndicator {
    pub fn new(config: SmaConfig) -> Self {
        assert!(config.window > 0, "SMA window must be > 0");
        Self {
            config,
            cache: ValueCache::new(),
        }
    }

    pub fn config(&self) -> &SmaConfig {
        &self.config
    }

    fn initialize(&mut self, source: &dyn BarSource) {
        let prices = self.config.price.series(source.all_bars());
        let values = ma::sma(&prices, self.config.window);
        debug!(indicator = "SMA", bars = values.len(), "Bulk initialized");
        self.cache.bulk_load(values);
    }

    /// SMA at `ix` from the trailing window only.
    fn compute_at(&self, source: &dyn BarSource, ix: usize) -> Result<f64, IndicatorError> {
        let Some(range) = window::trailing(ix, self.config.window) else {
            return Ok(f64::NAN);
        };
        let prices = self.config.price.series(source.window(range)?);
        Ok(ma::sma(&prices, self.config.window)
            .last()
            .copied()
            .unwrap_or(f64::NAN))
    }
}

impl Default for SmaIndicator {
    fn default() -> Self {
        Self::new(SmaConfig::default())
    }
}

impl ChartIndicator for SmaIndicator {
    fn name(&self) -> &str {
        "SMA"
    }

    fn value_at(&mut self, source: &dyn BarSource, ix: isize) -> Result<f64, IndicatorError> {
        if ix < 0 {
            return Ok(0.0);
        }
        let ix = window::checked_index(source, ix)?;

        if !self.cache.is_initialized() {
            self.initialize(source);
        }

        if self.cache.needs_recompute(ix) {
            for i in window::settling(self.cache.max_key(), ix) {
                let value = self.compute_at(source, i)?;
                trace!(indicator = "SMA", ix = i, value, "Recomputed");
                self.cache.insert(i, value);
            }
        }

        Ok(self.cache.get(ix).unwrap_or(f64::NAN))
    }

    fn label_text(&self, ix: isize) -> String {
        let value = usize::try_from(ix).ok().and_then(|ix| self.cache.get(ix));
        label::label_text("SMA", value, 1)
    }

    fn clear_all(&mut self) {
        self.cache.clear();
    }

    fn state(&self) -> CacheState {
        self.cache.state()
    }

    fn cached(&self, ix: usize) -> Option<f64> {
        self.cache.get(ix)
    }
}
