use crate::models::*;
use chrono::{DateTime, Utc};
use std::ops::Range;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during data operations.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Data not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Bar index {index} out of range (have {len} bars)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Bar at {timestamp} is older than the last bar at {last}")]
    OutOfOrder {
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// Bar Source Trait
// ---------------------------------------------------------------------------

/// An append-only, randomly indexable sequence of bars.
///
/// Indices are zero-based and equal to arrival order. Indicator caches only
/// ever borrow a source immutably.
pub trait BarSource {
    /// The full history, in arrival order.
    fn all_bars(&self) -> &[Bar];

    /// The bar at `index`.
    fn bar_at(&self, index: usize) -> Result<&Bar, DataError> {
        let bars = self.all_bars();
        bars.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: bars.len(),
        })
    }

    /// A contiguous run of bars.
    fn window(&self, range: Range<usize>) -> Result<&[Bar], DataError> {
        let bars = self.all_bars();
        let len = bars.len();
        if range.start > range.end || range.end > len {
            return Err(DataError::IndexOutOfRange {
                index: range.end.saturating_sub(1).max(range.start),
                len,
            });
        }
        Ok(&bars[range])
    }

    fn len(&self) -> usize {
        self.all_bars().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the most recent bar, `None` while the source is empty.
    fn last_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }
}

impl BarSource for Vec<Bar> {
    fn all_bars(&self) -> &[Bar] {
        self
    }
}

impl BarSource for [Bar] {
    fn all_bars(&self) -> &[Bar] {
        self
    }
}
