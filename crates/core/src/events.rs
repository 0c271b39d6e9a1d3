use crate::models::*;
use serde::{Deserialize, Serialize};

/// What a bar update did to the bar sequence.
///
/// A bar source distinguishes a brand-new bar from an in-place revision of
/// the still-forming last bar. Indicator caches rely on the same distinction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarEvent {
    /// A new bar was appended at `index`.
    Appended { index: usize, bar: Bar },
    /// The last bar, at `index`, was replaced with new content.
    Revised { index: usize, bar: Bar },
}

impl BarEvent {
    pub fn index(&self) -> usize {
        match self {
            BarEvent::Appended { index, .. } | BarEvent::Revised { index, .. } => *index,
        }
    }

    pub fn bar(&self) -> &Bar {
        match self {
            BarEvent::Appended { bar, .. } | BarEvent::Revised { bar, .. } => bar,
        }
    }

    pub fn is_append(&self) -> bool {
        matches!(self, BarEvent::Appended { .. })
    }
}
