//! Indicator error types.

use barlens_core::DataError;
use thiserror::Error;

/// Errors surfaced across the indicator boundary.
///
/// Numeric edge cases (short history, degenerate ranges) never show up here;
/// they resolve to each indicator's sentinel value.
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// Lookup past the last bar of the source.
    #[error("index {index} is beyond the last bar ({last:?})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Last valid index, `None` for an empty source.
        last: Option<usize>,
    },

    /// Invalid parameters for the indicator
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Settings file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The bar source refused a read
    #[error(transparent)]
    Data(#[from] DataError),
}

impl IndicatorError {
    /// Creates an `InvalidParams` error with a message.
    #[must_use]
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        IndicatorError::InvalidParams(msg.into())
    }
}
