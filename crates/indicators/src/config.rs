//! Indicator settings, loadable from TOML.
//!
//! ```toml
//! [sma]
//! window = 20
//! price = "open"
//!
//! [vqi]
//! ma_method = "linear_weighted"
//! filter_threshold = 0.5
//! ```
//!
//! Missing tables and keys fall back to the defaults.

use crate::error::IndicatorError;
use crate::rsi::{RsiConfig, RsiIndicator};
use crate::sma::{SmaConfig, SmaIndicator};
use crate::vqi::{VqiConfig, VqiIndicator};
use crate::ChartIndicator;
use serde::{Deserialize, Serialize};

const MAX_PRECISION: usize = 10;

/// Parameters for every indicator engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub sma: SmaConfig,
    pub rsi: RsiConfig,
    pub vqi: VqiConfig,
}

impl IndicatorSettings {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, IndicatorError> {
        let settings: IndicatorSettings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), IndicatorError> {
        if self.sma.window == 0 {
            return Err(IndicatorError::invalid_params("sma.window must be > 0"));
        }
        if self.rsi.window == 0 {
            return Err(IndicatorError::invalid_params("rsi.window must be > 0"));
        }
        if self.vqi.period == 0 {
            return Err(IndicatorError::invalid_params("vqi.period must be > 0"));
        }
        for (name, value) in [
            ("vqi.filter_threshold", self.vqi.filter_threshold),
            ("vqi.currency_point", self.vqi.currency_point),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(IndicatorError::invalid_params(format!(
                    "{name} must be a finite, non-negative number (got {value})"
                )));
            }
        }
        if self.vqi.precision > MAX_PRECISION {
            return Err(IndicatorError::invalid_params(format!(
                "vqi.precision must be <= {MAX_PRECISION}"
            )));
        }
        Ok(())
    }

    /// One engine per indicator, in display order.
    pub fn build(&self) -> Result<Vec<Box<dyn ChartIndicator>>, IndicatorError> {
        self.validate()?;
        let sma: Box<dyn ChartIndicator> = Box::new(SmaIndicator::new(self.sma));
        let rsi: Box<dyn ChartIndicator> = Box::new(RsiIndicator::new(self.rsi));
        let vqi: Box<dyn ChartIndicator> = Box::new(VqiIndicator::new(self.vqi));
        Ok(vec![sma, rsi, vqi])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ma::MaMethod;
    use barlens_core::PriceField;

    #[test]
    fn test_empty_document_gives_defaults() {
        let settings = IndicatorSettings::from_toml_str("").unwrap();
        assert_eq!(settings, IndicatorSettings::default());
        assert_eq!(settings.sma.window, 20);
        assert_eq!(settings.rsi.window, 14);
        assert_eq!(settings.vqi.start(), 10);
    }

    #[test]
    fn test_partial_document() {
        let settings = IndicatorSettings::from_toml_str(
            r#"
            [sma]
            price = "open"

            [vqi]
            ma_method = "smoothed"
            filter_threshold = 0.25
            precision = 5
            "#,
        )
        .unwrap();
        assert_eq!(settings.sma.window, 20);
        assert_eq!(settings.sma.price, PriceField::Open);
        assert_eq!(settings.vqi.ma_method, MaMethod::Smoothed);
        assert_eq!(settings.vqi.filter_threshold, 0.25);
        assert_eq!(settings.vqi.period, 5);
        assert_eq!(settings.vqi.precision, 5);
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = IndicatorSettings::from_toml_str("[rsi]\nwindow = 0\n").unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidParams(_)), "{err}");
    }

    #[test]
    fn test_rejects_negative_filter() {
        let err = IndicatorSettings::from_toml_str("[vqi]\nfilter_threshold = -1.0\n").unwrap_err();
        assert!(err.to_string().contains("vqi.filter_threshold"), "{err}");
    }

    #[test]
    fn test_rejects_unknown_method() {
        let err = IndicatorSettings::from_toml_str("[vqi]\nma_method = \"hull\"\n").unwrap_err();
        assert!(matches!(err, IndicatorError::Config(_)));
    }

    #[test]
    fn test_build_all_engines() {
        let engines = IndicatorSettings::default().build().unwrap();
        let names: Vec<&str> = engines.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["SMA", "RSI", "VQI"]);
    }
}
