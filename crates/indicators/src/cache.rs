//! Index-keyed value cache shared by every indicator engine.

use std::collections::BTreeMap;

/// Lifecycle of an indicator cache.
///
/// `clear()` is the only way back to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheState {
    #[default]
    Uninitialized,
    /// Filled from the full history in one pass, not touched since.
    BulkInitialized,
    /// At least one value written after the bulk pass.
    IncrementallyMaintained,
}

/// How a lookup index relates to the cache contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Nothing cached yet; the next lookup bulk-initializes.
    Empty,
    /// No value at this index.
    Missing,
    /// Highest cached index. Its bar may still be forming.
    Provisional,
    /// Below the highest cached index.
    Finalized,
}

/// Sparse bar-index → value map.
///
/// Values below the maximum key are finalized; the maximum key is
/// provisional and gets recomputed on every lookup that targets it.
#[derive(Debug, Clone)]
pub struct ValueCache<T> {
    values: BTreeMap<usize, T>,
    state: CacheState,
}

impl<T> Default for ValueCache<T> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            state: CacheState::Uninitialized,
        }
    }
}

impl<T: Copy> ValueCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state != CacheState::Uninitialized
    }

    pub fn get(&self, ix: usize) -> Option<T> {
        self.values.get(&ix).copied()
    }

    pub fn max_key(&self) -> Option<usize> {
        self.values.last_key_value().map(|(k, _)| *k)
    }

    pub fn slot(&self, ix: usize) -> Slot {
        if !self.is_initialized() {
            return Slot::Empty;
        }
        match self.max_key() {
            Some(max) if ix == max => Slot::Provisional,
            _ if self.values.contains_key(&ix) => Slot::Finalized,
            _ => Slot::Missing,
        }
    }

    /// Whether a lookup at `ix` has to compute rather than read.
    pub fn needs_recompute(&self, ix: usize) -> bool {
        matches!(self.slot(ix), Slot::Empty | Slot::Missing | Slot::Provisional)
    }

    /// Replace the contents with `values`, keyed by position.
    pub fn bulk_load(&mut self, values: impl IntoIterator<Item = T>) {
        self.values = values.into_iter().enumerate().collect();
        self.state = CacheState::BulkInitialized;
    }

    pub fn insert(&mut self, ix: usize, value: T) {
        self.values.insert(ix, value);
        self.state = CacheState::IncrementallyMaintained;
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.state = CacheState::Uninitialized;
    }
}
