//! Volatility Quality Index (VQI).
//!
//! VQI compares moving averages of the four bar prices. Raw signals weaker
//! than a noise filter carry the previous value forward, so every value
//! depends on the one before it. When bars change, the engine re-derives a
//! short trailing band from a finalized anchor instead of patching one point.

use crate::cache::{CacheState, ValueCache};
use crate::error::IndicatorError;
use crate::ma::{self, MaMethod};
use crate::{label, window, ChartIndicator};
use barlens_core::{Bar, BarSource, PriceField};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Parameters for [`VqiIndicator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VqiConfig {
    /// Moving-average window.
    pub period: usize,
    pub ma_method: MaMethod,
    /// How many bars back the averaged close is compared against.
    pub smoothing: usize,
    pub filter_threshold: f64,
    /// Price scale applied to the filter threshold.
    pub currency_point: f64,
    /// Decimal places in the info label.
    pub precision: usize,
}

impl Default for VqiConfig {
    fn default() -> Self {
        Self {
            period: 5,
            ma_method: MaMethod::LinearWeighted,
            smoothing: 2,
            filter_threshold: 1.0,
            currency_point: 1.0,
            precision: 1,
        }
    }
}

impl VqiConfig {
    /// First bar index with a defined VQI; everything before is 0.
    pub fn start(&self) -> usize {
        self.smoothing + self.period + 3
    }

    /// Raw signals with a smaller magnitude hold the previous value.
    pub fn gate(&self) -> f64 {
        self.filter_threshold * self.currency_point
    }
}

/// Outcome of the per-bar VQI rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VqiStep {
    /// Zero averaged range (or undefined inputs); the value is 0.
    Degenerate,
    /// Below the noise filter; the previous value carried forward.
    Held(f64),
    Signal(f64),
}

impl VqiStep {
    pub fn value(self) -> f64 {
        match self {
            VqiStep::Degenerate => 0.0,
            VqiStep::Held(v) | VqiStep::Signal(v) => v,
        }
    }
}

/// The per-bar rule on averaged prices.
///
/// `c2` is the averaged close `smoothing` bars back; `previous` the finalized
/// value of the preceding bar.
pub fn vqi_step(o: f64, h: f64, l: f64, c: f64, c2: f64, previous: f64, gate: f64) -> VqiStep {
    if ![o, h, l, c, c2].iter().all(|v| v.is_finite()) {
        return VqiStep::Degenerate;
    }
    let range = h - l;
    let max_p = range.max(h - c2).max(c2 - l);
    if max_p == 0.0 || range == 0.0 {
        return VqiStep::Degenerate;
    }

    let vq = (((c - c2) / max_p + (c - o) / range) * 0.5).abs() * ((c - c2) + (c - o)) * 0.5;
    if !vq.is_finite() {
        VqiStep::Degenerate
    } else if vq.abs() < gate {
        VqiStep::Held(previous)
    } else {
        VqiStep::Signal(vq)
    }
}

/// Averaged open/high/low/close at one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ohlc {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl Ohlc {
    const UNDEFINED: Ohlc = Ohlc {
        open: f64::NAN,
        high: f64::NAN,
        low: f64::NAN,
        close: f64::NAN,
    };

    fn is_defined(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Advance a recursive average by one bar. `None` for finite-window methods.
    fn step(&self, bar: &Bar, config: &VqiConfig) -> Option<Ohlc> {
        let next = |prev: f64, field: PriceField| {
            config.ma_method.step(prev, field.extract(bar), config.period)
        };
        Some(Ohlc {
            open: next(self.open, PriceField::Open)?,
            high: next(self.high, PriceField::High)?,
            low: next(self.low, PriceField::Low)?,
            close: next(self.close, PriceField::Close)?,
        })
    }
}

/// One cached VQI value with the averages it was derived from.
///
/// Recursive averages (exponential, smoothed) continue from these.
#[derive(Debug, Clone, Copy, PartialEq)]
struct VqiPoint {
    value: f64,
    averages: Ohlc,
}

/// Moving averages of open/high/low/close over one run of bars, index-aligned.
struct OhlcAverages {
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
}

impl OhlcAverages {
    fn new(bars: &[Bar], config: &VqiConfig) -> Self {
        let average = |field: PriceField| {
            ma::moving_average(&field.series(bars), config.period, config.ma_method)
        };
        Self {
            open: average(PriceField::Open),
            high: average(PriceField::High),
            low: average(PriceField::Low),
            close: average(PriceField::Close),
        }
    }

    fn at(&self, p: usize) -> Ohlc {
        Ohlc {
            open: self.open[p],
            high: self.high[p],
            low: self.low[p],
            close: self.close[p],
        }
    }

    fn last(&self) -> Ohlc {
        self.close
            .len()
            .checked_sub(1)
            .map_or(Ohlc::UNDEFINED, |p| self.at(p))
    }
}

/// Volatility Quality Index overlay.
#[derive(Debug, Clone)]
pub struct VqiIndicator {
    config: VqiConfig,
    cache: ValueCache<VqiPoint>,
}

impl VqiIndicator {
    pub fn new(config: VqiConfig) -> Self {
        assert!(config.period > 0, "VQI period must be > 0");
        Self {
            config,
            cache: ValueCache::new(),
        }
    }

    pub fn config(&self) -> &VqiConfig {
        &self.config
    }

    fn bulk_points(&self, bars: &[Bar]) -> Vec<VqiPoint> {
        let start = self.config.start();
        let averages = OhlcAverages::new(bars, &self.config);
        let mut points: Vec<VqiPoint> = (0..bars.len())
            .map(|i| VqiPoint {
                value: 0.0,
                averages: averages.at(i),
            })
            .collect();

        let mut degenerate = 0usize;
        for i in start..bars.len() {
            let c2 = averages.close[i - self.config.smoothing];
            let step = self.step(points[i].averages, c2, points[i - 1].value);
            if step == VqiStep::Degenerate {
                degenerate += 1;
            }
            points[i].value = step.value();
        }
        if degenerate > 0 {
            debug!(indicator = "VQI", degenerate, "Degenerate ranges resolved to 0");
        }
        points
    }

    fn initialize(&mut self, source: &dyn BarSource) {
        let points = self.bulk_points(source.all_bars());
        debug!(indicator = "VQI", bars = points.len(), "Bulk initialized");
        self.cache.bulk_load(points);
    }

    fn step(&self, averages: Ohlc, c2: f64, previous: f64) -> VqiStep {
        vqi_step(
            averages.open,
            averages.high,
            averages.low,
            averages.close,
            c2,
            previous,
            self.config.gate(),
        )
    }

    /// The four averages at `g`.
    ///
    /// Finite-window methods read the trailing `period` bars. Recursive
    /// methods take one step from the cached averages at `g - 1`, and fall
    /// back to running the series from the first bar when there are none.
    fn averages_at(&self, source: &dyn BarSource, g: usize) -> Result<Ohlc, IndicatorError> {
        let period = self.config.period;
        if self.config.ma_method.is_finite_window() {
            let Some(range) = window::trailing(g, period) else {
                return Ok(Ohlc::UNDEFINED);
            };
            return Ok(OhlcAverages::new(source.window(range)?, &self.config).last());
        }

        let previous = g
            .checked_sub(1)
            .and_then(|p| self.cache.get(p))
            .map(|point| point.averages)
            .filter(Ohlc::is_defined);
        if let Some(previous) = previous {
            if let Some(next) = previous.step(source.bar_at(g)?, &self.config) {
                return Ok(next);
            }
        }
        Ok(OhlcAverages::new(source.window(0..g + 1)?, &self.config).last())
    }

    fn point_at(&self, source: &dyn BarSource, g: usize) -> Result<VqiPoint, IndicatorError> {
        let averages = self.averages_at(source, g)?;
        if g < self.config.start() {
            return Ok(VqiPoint {
                value: 0.0,
                averages,
            });
        }

        let back = g - self.config.smoothing;
        let c2 = if back == g {
            averages.close
        } else if let Some(point) = self.cache.get(back) {
            point.averages.close
        } else {
            self.averages_at(source, back)?.close
        };
        let previous = self.cache.get(g - 1).map_or(0.0, |p| p.value);

        let step = self.step(averages, c2, previous);
        if step == VqiStep::Degenerate {
            debug!(indicator = "VQI", ix = g, "Degenerate range, value set to 0");
        }
        Ok(VqiPoint {
            value: step.value(),
            averages,
        })
    }

    /// Re-derive the trailing band `{ix - 1, ix}`.
    ///
    /// `ix - 1` is rebuilt on top of the finalized `ix - 2`, then `ix` on
    /// top of that, so a revision to the previous bar that was never read
    /// still reaches the cache.
    fn rederive(&mut self, source: &dyn BarSource, ix: usize) -> Result<(), IndicatorError> {
        for g in ix.saturating_sub(1)..=ix {
            let point = self.point_at(source, g)?;
            trace!(indicator = "VQI", ix = g, value = point.value, "Re-derived");
            self.cache.insert(g, point);
        }
        Ok(())
    }
}

impl Default for VqiIndicator {
    fn default() -> Self {
        Self::new(VqiConfig::default())
    }
}

impl ChartIndicator for VqiIndicator {
    fn name(&self) -> &str {
        "VQI"
    }

    fn value_at(&mut self, source: &dyn BarSource, ix: isize) -> Result<f64, IndicatorError> {
        if ix < self.config.start() as isize {
            return Ok(0.0);
        }
        let ix = window::checked_index(source, ix)?;

        if !self.cache.is_initialized() {
            self.initialize(source);
        }

        if self.cache.needs_recompute(ix) {
            for i in window::pending(self.cache.max_key(), ix) {
                self.rederive(source, i)?;
            }
        }

        Ok(self.cached(ix).unwrap_or(0.0))
    }

    fn label_text(&self, ix: isize) -> String {
        let value = usize::try_from(ix).ok().and_then(|ix| self.cached(ix));
        label::label_text("VQI", value, self.config.precision)
    }

    fn clear_all(&mut self) {
        self.cache.clear();
    }

    fn state(&self) -> CacheState {
        self.cache.state()
    }

    fn cached(&self, ix: usize) -> Option<f64> {
        self.cache.get(ix).map(|p| p.value)
    }
}
