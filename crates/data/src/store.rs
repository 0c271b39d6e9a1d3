use barlens_core::{Bar, BarEvent, BarSource, DataError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, trace};

/// In-memory, append-only bar history.
///
/// Only the last bar may change after it arrives: an update carrying the
/// last bar's timestamp replaces it, a later timestamp appends a new bar.
#[derive(Debug, Clone, Default)]
pub struct BarManager {
    bars: Vec<Bar>,
    index: HashMap<DateTime<Utc>, usize>,
}

impl BarManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from bars already in timestamp order.
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self, DataError> {
        let mut manager = Self::new();
        manager.update_bars(bars)?;
        debug!(bars = manager.len(), "Bar history loaded");
        Ok(manager)
    }

    /// Apply one bar update.
    pub fn update_bar(&mut self, bar: Bar) -> Result<BarEvent, DataError> {
        let Some(last) = self.bars.last_mut() else {
            return Ok(self.append(bar));
        };

        if bar.timestamp == last.timestamp {
            *last = bar.clone();
            let index = self.bars.len() - 1;
            trace!(index, timestamp = %bar.timestamp, "Bar revised");
            Ok(BarEvent::Revised { index, bar })
        } else if bar.timestamp > last.timestamp {
            Ok(self.append(bar))
        } else {
            Err(DataError::OutOfOrder {
                timestamp: bar.timestamp,
                last: last.timestamp,
            })
        }
    }

    /// Apply updates in order, stopping at the first rejected bar.
    pub fn update_bars<I>(&mut self, bars: I) -> Result<Vec<BarEvent>, DataError>
    where
        I: IntoIterator<Item = Bar>,
    {
        bars.into_iter().map(|bar| self.update_bar(bar)).collect()
    }

    pub fn index_of(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        self.index.get(&timestamp).copied()
    }

    /// Lowest low and highest high over `min_ix..=max_ix`.
    pub fn price_range(
        &self,
        min_ix: usize,
        max_ix: usize,
    ) -> Result<(Decimal, Decimal), DataError> {
        if min_ix > max_ix {
            return Err(DataError::IndexOutOfRange {
                index: min_ix,
                len: self.bars.len(),
            });
        }
        let bars = self.window(min_ix..max_ix + 1)?;
        let low = bars.iter().map(|b| b.low).min().unwrap_or_default();
        let high = bars.iter().map(|b| b.high).max().unwrap_or_default();
        Ok((low, high))
    }

    pub fn clear(&mut self) {
        self.bars.clear();
        self.index.clear();
    }

    fn append(&mut self, bar: Bar) -> BarEvent {
        let index = self.bars.len();
        self.index.insert(bar.timestamp, index);
        self.bars.push(bar.clone());
        trace!(index, timestamp = %bar.timestamp, "Bar appended");
        BarEvent::Appended { index, bar }
    }
}

impl BarSource for BarManager {
    fn all_bars(&self) -> &[Bar] {
        &self.bars
    }
}
