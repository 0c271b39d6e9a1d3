use barlens_core::{Bar, DataError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Load OHLC(V) bars from a CSV file.
///
/// Expected columns (case-insensitive, flexible ordering):
/// `timestamp` (or `date`, `datetime`, `time`), `open`, `high`, `low`, `close`,
/// and optionally `volume`.
///
/// Bars come back sorted by timestamp.
pub fn load_bars_from_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    if !path.exists() {
        return Err(DataError::NotFound(format!(
            "CSV file not found: {}",
            path.display()
        )));
    }
    let file = std::fs::File::open(path)?;
    let bars = read_bars(file)?;
    debug!(file = %path.display(), bars = bars.len(), "Loaded bars");
    Ok(bars)
}

/// Read bars from any CSV source. See [`load_bars_from_csv`].
pub fn read_bars<R: io::Read>(source: R) -> Result<Vec<Bar>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| DataError::ParseError(format!("Failed to read headers: {}", e)))?
        .clone();

    let col_map = resolve_bar_columns(&headers)?;

    let mut bars = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| DataError::ParseError(format!("CSV record error: {}", e)))?;
        let field = |idx: usize, name: &str| {
            record
                .get(idx)
                .ok_or_else(|| DataError::ParseError(format!("Missing {} field", name)))
        };

        let timestamp = parse_timestamp(field(col_map.timestamp, "timestamp")?)?;
        let open = parse_decimal(field(col_map.open, "open")?, "open")?;
        let high = parse_decimal(field(col_map.high, "high")?, "high")?;
        let low = parse_decimal(field(col_map.low, "low")?, "low")?;
        let close = parse_decimal(field(col_map.close, "close")?, "close")?;
        let volume = match col_map.volume {
            Some(vol_idx) => parse_decimal(field(vol_idx, "volume")?, "volume")?,
            None => Decimal::ZERO,
        };

        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct BarColumnMap {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

fn resolve_bar_columns(headers: &csv::StringRecord) -> Result<BarColumnMap, DataError> {
    let required = |names: &[&str], label: &str| {
        find_column(headers, names)
            .ok_or_else(|| DataError::ParseError(format!("No {} column found", label)))
    };

    Ok(BarColumnMap {
        timestamp: required(&["timestamp", "date", "datetime", "time"], "timestamp")?,
        open: required(&["open", "o"], "open")?,
        high: required(&["high", "h"], "high")?,
        low: required(&["low", "l"], "low")?,
        close: required(&["close", "c"], "close")?,
        volume: find_column(headers, &["volume", "vol", "v"]),
    })
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let h = header.trim().to_lowercase();
        names.iter().any(|name| h == *name)
    })
}

fn parse_decimal(s: &str, field: &str) -> Result<Decimal, DataError> {
    Decimal::from_str(s.trim())
        .or_else(|_| Decimal::from_scientific(s.trim()))
        .map_err(|e| DataError::ParseError(format!("Failed to parse {} '{}': {}", field, s, e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DataError> {
    let s = s.trim();

    // RFC 3339 / ISO 8601 with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Common formats without timezone, taken as UTC
    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%Y%m%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }

    if let Some(naive) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }

    // Unix timestamp (seconds)
    if let Some(dt) = s.parse::<i64>().ok().and_then(|ts| DateTime::from_timestamp(ts, 0)) {
        return Ok(dt);
    }

    Err(DataError::ParseError(format!(
        "Unable to parse timestamp: '{}'",
        s
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_read_bars_flexible_columns() {
        let csv = "\
Date,Close,High,Low,Open,Volume
2024-01-03 09:31:00,101.5,102,100.75,101,1200
2024-01-03 09:30:00,101,101.25,99.5,100,900
";
        let bars = read_bars(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        // sorted by timestamp
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap()
        );
        assert_eq!(bars[0].open, dec!(100));
        assert_eq!(bars[1].close, dec!(101.5));
        assert_eq!(bars[1].volume, dec!(1200));
    }

    #[test]
    fn test_read_bars_without_volume() {
        let csv = "timestamp,o,h,l,c\n1704274200,1,2,0.5,1.5\n";
        let bars = read_bars(csv.as_bytes()).unwrap();
        assert_eq!(bars[0].volume, Decimal::ZERO);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_column() {
        let csv = "timestamp,open,high,close\n2024-01-03,1,2,1.5\n";
        match read_bars(csv.as_bytes()) {
            Err(DataError::ParseError(msg)) => assert!(msg.contains("low"), "{msg}"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-03").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-03T00:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("01/03/2024 00:00").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_bars_from_csv(Path::new("/nonexistent/bars.csv")).unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }
}
