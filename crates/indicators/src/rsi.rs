use crate::cache::{CacheState, ValueCache};
use crate::error::IndicatorError;
use crate::{label, window, ChartIndicator};
use barlens_core::{BarSource, PriceField};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Value returned for bars before the first full window.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Parameters for [`RsiIndicator`]. Always reads the close price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
    pub window: usize,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self { window: 14 }
    }
}

/// One cached RSI value together with the Wilder averages that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RsiPoint {
    value: f64,
    avg_gain: f64,
    avg_loss: f64,
}

impl RsiPoint {
    const UNDEFINED: RsiPoint = RsiPoint {
        value: f64::NAN,
        avg_gain: f64::NAN,
        avg_loss: f64::NAN,
    };

    fn from_averages(avg_gain: f64, avg_loss: f64) -> Self {
        let total = avg_gain + avg_loss;
        let value = if total == 0.0 {
            0.0
        } else {
            100.0 * (avg_gain / total)
        };
        Self {
            value,
            avg_gain,
            avg_loss,
        }
    }

    fn is_defined(&self) -> bool {
        self.avg_gain.is_finite() && self.avg_loss.is_finite()
    }

    /// Seed from `period` price changes: plain average of gains and losses.
    fn seed(closes: &[f64]) -> Self {
        let period = closes.len() - 1;
        let (mut gains, mut losses) = (0.0, 0.0);
        for pair in closes.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gains += change;
            } else {
                losses -= change;
            }
        }
        Self::from_averages(gains / period as f64, losses / period as f64)
    }

    /// Wilder's smoothing step.
    fn step(&self, change: f64, period: usize) -> Self {
        let n = period as f64;
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        Self::from_averages(
            (self.avg_gain * (n - 1.0) + gain) / n,
            (self.avg_loss * (n - 1.0) + loss) / n,
        )
    }
}

/// Wilder RSI over a full close series. Undefined before index `period`.
fn wilder_rsi(closes: &[f64], period: usize) -> Vec<RsiPoint> {
    let mut out = vec![RsiPoint::UNDEFINED; closes.len()];
    if closes.len() <= period {
        return out;
    }
    let mut point = RsiPoint::seed(&closes[..=period]);
    out[period] = point;
    for i in (period + 1)..closes.len() {
        point = point.step(closes[i] - closes[i - 1], period);
        out[i] = point;
    }
    out
}

/// Relative Strength Index (RSI) oscillator.
///
/// Uses Wilder's smoothing for average gain/loss. Each cached entry keeps the
/// smoothed averages, so a new or revised bar costs one smoothing step from
/// the entry before it. A new bar first re-steps the previous entry, which
/// may have been read before its bar's last revision.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    config: RsiConfig,
    cache: ValueCache<RsiPoint>,
}

impl RsiIndicator {
    pub fn new(config: RsiConfig) -> Self {
        assert!(config.window > 0, "RSI window must be > 0");
        Self {
            config,
            cache: ValueCache::new(),
        }
    }

    pub fn config(&self) -> &RsiConfig {
        &self.config
    }

    fn initialize(&mut self, source: &dyn BarSource) {
        let closes = PriceField::Close.series(source.all_bars());
        let points = wilder_rsi(&closes, self.config.window);
        debug!(indicator = "RSI", bars = points.len(), "Bulk initialized");
        self.cache.bulk_load(points);
    }

    fn compute_at(&self, source: &dyn BarSource, ix: usize) -> Result<RsiPoint, IndicatorError> {
        let period = self.config.window;
        if ix < period {
            return Ok(RsiPoint::UNDEFINED);
        }

        if let Some(prev) = self.cache.get(ix - 1).filter(RsiPoint::is_defined) {
            let bars = source.window(ix - 1..ix + 1)?;
            let change = PriceField::Close.extract(&bars[1]) - PriceField::Close.extract(&bars[0]);
            return Ok(prev.step(change, period));
        }

        // no smoothed predecessor: seed from the trailing window
        let range = ix - period..ix + 1;
        let closes = PriceField::Close.series(source.window(range)?);
        Ok(RsiPoint::seed(&closes))
    }
}

impl Default for RsiIndicator {
    fn default() -> Self {
        Self::new(RsiConfig::default())
    }
}

impl ChartIndicator for RsiIndicator {
    fn name(&self) -> &str {
        "RSI"
    }

    fn value_at(&mut self, source: &dyn BarSource, ix: isize) -> Result<f64, IndicatorError> {
        if ix < self.config.window as isize {
            return Ok(RSI_NEUTRAL);
        }
        let ix = window::checked_index(source, ix)?;

        if !self.cache.is_initialized() {
            self.initialize(source);
        }

        if self.cache.needs_recompute(ix) {
            for i in window::settling(self.cache.max_key(), ix) {
                let point = self.compute_at(source, i)?;
                trace!(indicator = "RSI", ix = i, value = point.value, "Recomputed");
                self.cache.insert(i, point);
            }
        }

        Ok(self.cache.get(ix).map_or(f64::NAN, |p| p.value))
    }

    fn label_text(&self, ix: isize) -> String {
        let value = usize::try_from(ix).ok().and_then(|ix| self.cached(ix));
        label::label_text("RSI", value, 1)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{assert_same_cache, flat_bars, random_walk, replay};
    use barlens_core::Bar;

    #[test]
    fn test_rsi_warmup_is_neutral() {
        let source = random_walk(30, 3);
        let mut rsi = RsiIndicator::default();
        for ix in -1..14 {
            assert_eq!(rsi.value_at(&source, ix).unwrap(), RSI_NEUTRAL);
        }
        assert_eq!(rsi.state(), CacheState::Uninitialized);
        assert_eq!(rsi.label_text(5), "RSI -");

        // the neutral floor holds whatever the history length
        let short = random_walk(3, 3);
        assert_eq!(rsi.value_at(&short, 10).unwrap(), RSI_NEUTRAL);
    }

    #[test]
    fn test_rsi_rising_series_is_100() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + i as f64 * 0.5).collect();
        let source = flat_bars(&closes);
        let mut rsi = RsiIndicator::default();
        for ix in 14..40 {
            assert_eq!(rsi.value_at(&source, ix).unwrap(), 100.0);
        }
        assert_eq!(rsi.label_text(20), "RSI 100.0");
    }

    #[test]
    fn test_rsi_flat_series_is_zero() {
        let source = flat_bars(&[10.0; 20]);
        let mut rsi = RsiIndicator::default();
        assert_eq!(rsi.value_at(&source, 19).unwrap(), 0.0);
    }

    #[test]
    fn test_rsi_reference_values() {
        // Wilder's worked example, RSI(14)
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ];
        let source = flat_bars(&closes);
        let mut rsi = RsiIndicator::default();
        let first = rsi.value_at(&source, 14).unwrap();
        assert!((first - 70.464).abs() < 0.001, "{first}");
        let second = rsi.value_at(&source, 15).unwrap();
        assert!((second - 66.250).abs() < 0.001, "{second}");
        assert_eq!(rsi.label_text(14), "RSI 70.5");
    }

    #[test]
    fn test_rsi_bulk_matches_incremental() {
        let bars = random_walk(150, 11);

        let mut incremental = RsiIndicator::default();
        let source = replay(&mut incremental, &bars, true, true).unwrap();

        let mut bulk = RsiIndicator::default();
        bulk.value_at(&source, 149).unwrap();

        assert_same_cache(&incremental, &bulk, bars.len());
    }

    #[test]
    fn test_rsi_unqueried_revision_does_not_leak_forward() {
        let bars = random_walk(100, 13);
        let mut source = bars[..80].to_vec();
        let mut rsi = RsiIndicator::default();
        rsi.value_at(&source, 79).unwrap();

        // bar 80 is read while forming, then completes without another read
        source.push(Bar::opening(bars[80].timestamp, bars[80].open));
        rsi.value_at(&source, 80).unwrap();
        source[80] = bars[80].clone();

        for ix in 81..100 {
            source.push(bars[ix].clone());
            rsi.value_at(&source, ix as isize).unwrap();
        }

        let mut bulk = RsiIndicator::default();
        bulk.value_at(&source, 99).unwrap();
        assert_same_cache(&rsi, &bulk, source.len());
    }

    #[test]
    fn test_rsi_settles_every_revised_bar() {
        let bars = random_walk(150, 29);

        // each bar is queried only as an opening print, never in final form
        let mut incremental = RsiIndicator::default();
        let source = replay(&mut incremental, &bars, true, false).unwrap();
        incremental.value_at(&source, 149).unwrap();

        let mut bulk = RsiIndicator::default();
        bulk.value_at(&source, 149).unwrap();

        assert_same_cache(&incremental, &bulk, bars.len());
    }

    #[test]
    fn test_rsi_append_leaves_history_alone() {
        let bars = random_walk(80, 5);
        let mut source = bars[..79].to_vec();
        let mut rsi = RsiIndicator::default();
        rsi.value_at(&source, 78).unwrap();
        let before: Vec<Option<f64>> = (0..78).map(|ix| rsi.cached(ix)).collect();

        source.push(bars[79].clone());
        rsi.value_at(&source, 79).unwrap();

        let after: Vec<Option<f64>> = (0..78).map(|ix| rsi.cached(ix)).collect();
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.map(f64::to_bits), a.map(f64::to_bits));
        }
    }

    #[test]
    fn test_rsi_stays_in_bounds() {
        let source = random_walk(200, 99);
        let mut rsi = RsiIndicator::new(RsiConfig { window: 6 });
        for ix in 0..200 {
            let v = rsi.value_at(&source, ix).unwrap();
            assert!((0.0..=100.0).contains(&v), "ix {ix}: {v}");
        }
    }
}
