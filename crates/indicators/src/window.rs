//! Index arithmetic for bounded recomputation windows.

use crate::error::IndicatorError;
use barlens_core::BarSource;
use std::ops::{Range, RangeInclusive};

/// Validate a non-negative lookup index against the source.
pub fn checked_index(source: &dyn BarSource, ix: isize) -> Result<usize, IndicatorError> {
    let last = source.last_index();
    match (usize::try_from(ix), last) {
        (Ok(ix), Some(last)) if ix <= last => Ok(ix),
        (Ok(ix), _) => Err(IndicatorError::IndexOutOfRange { index: ix, last }),
        // negative indices are sentinel lookups, handled by each engine first
        (Err(_), _) => Err(IndicatorError::invalid_params(format!(
            "negative bar index {ix}"
        ))),
    }
}

/// The `len` bars ending at `ix` (inclusive), or `None` when history is shorter.
pub fn trailing(ix: usize, len: usize) -> Option<Range<usize>> {
    let end = ix + 1;
    end.checked_sub(len).map(|start| start..end)
}

/// Indices a lookup at `ix` has to (re)compute, in ascending order.
///
/// A lookup more than one past the highest cached index also fills the gap,
/// so values that depend on their predecessor are never computed from a hole.
pub fn pending(max_key: Option<usize>, ix: usize) -> RangeInclusive<usize> {
    match max_key {
        Some(max) if ix > max + 1 => (max + 1)..=ix,
        _ => ix..=ix,
    }
}

/// Like [`pending`], but a lookup past the highest cached index recomputes
/// that index too: its bar may have been revised after it was last read.
pub fn settling(max_key: Option<usize>, ix: usize) -> RangeInclusive<usize> {
    match max_key {
        Some(max) if ix > max => max..=ix,
        _ => ix..=ix,
    }
}
