use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// A single OHLCV bar.
///
/// The sequence index of a bar is implicit: it is the bar's position in the
/// [`BarSource`](crate::BarSource) that holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Create a bar without volume.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: Decimal::ZERO,
        }
    }

    /// A still-forming bar that has only seen its opening print.
    pub fn opening(timestamp: DateTime<Utc>, open: Decimal) -> Self {
        Self::new(timestamp, open, open, open, open)
    }

    /// Extract a price field as `f64`. Values that do not fit yield NaN.
    pub fn price(&self, field: PriceField) -> f64 {
        field.extract(self)
    }
}

// ---------------------------------------------------------------------------
// Price selection
// ---------------------------------------------------------------------------

/// Which price of a bar an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    #[default]
    Close,
}

impl PriceField {
    pub fn extract(self, bar: &Bar) -> f64 {
        let price = match self {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
        };
        price.to_f64().unwrap_or(f64::NAN)
    }

    /// Extract this field from every bar of a slice.
    pub fn series(self, bars: &[Bar]) -> Vec<f64> {
        bars.iter().map(|b| self.extract(b)).collect()
    }
}

impl std::fmt::Display for PriceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample() -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap(),
            dec!(100.5),
            dec!(102),
            dec!(99.25),
            dec!(101.75),
        )
    }

    #[test]
    fn test_price_field_extract() {
        let bar = sample();
        assert_eq!(bar.price(PriceField::Open), 100.5);
        assert_eq!(bar.price(PriceField::High), 102.0);
        assert_eq!(bar.price(PriceField::Low), 99.25);
        assert_eq!(bar.price(PriceField::Close), 101.75);
    }

    #[test]
    fn test_price_field_serde_names() {
        let json = serde_json::to_string(&PriceField::Open).unwrap();
        assert_eq!(json, "\"open\"");
        let parsed: PriceField = serde_json::from_str("\"close\"").unwrap();
        assert_eq!(parsed, PriceField::Close);
    }

    #[test]
    fn test_opening_bar_is_flat() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();
        let bar = Bar::opening(ts, dec!(50));
        assert_eq!(bar.high, bar.low);
        assert_eq!(bar.close, dec!(50));
        assert_eq!(bar.volume, Decimal::ZERO);
    }
}
