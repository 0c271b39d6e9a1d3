use crate::{ChartIndicator, IndicatorError};
use barlens_core::Bar;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

pub fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::minutes(i as i64)
}

fn price(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap()
}

pub fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(ts(i), price(open), price(high), price(low), price(close))
}

/// Flat bars (open = high = low = close) at the given closes.
pub fn flat_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| bar(i, *c, *c, *c, *c))
        .collect()
}

/// Deterministic random walk in cents, with a real high/low range on every bar.
pub fn random_walk(n: usize, seed: u64) -> Vec<Bar> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };

    let mut close: i64 = 1_000_000;
    (0..n)
        .map(|i| {
            let open = close;
            close = open + (next() % 201) as i64 - 100;
            let high = open.max(close) + (next() % 50) as i64;
            let low = open.min(close) - (next() % 50) as i64;
            Bar::new(
                ts(i),
                Decimal::new(open, 2),
                Decimal::new(high, 2),
                Decimal::new(low, 2),
                Decimal::new(close, 2),
            )
        })
        .collect()
}

/// Feed `bars` one at a time, querying the last index after every update.
///
/// With `revisions`, each bar first arrives as an opening-only bar and is then
/// revised to its final content; `query_final` controls whether the revised
/// bar is queried before the next bar arrives.
pub fn replay(
    indicator: &mut dyn ChartIndicator,
    bars: &[Bar],
    revisions: bool,
    query_final: bool,
) -> Result<Vec<Bar>, IndicatorError> {
    let mut source: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        let last = source.len() as isize;
        if revisions {
            source.push(Bar::opening(bar.timestamp, bar.open));
            indicator.value_at(&source, last)?;
            if let Some(slot) = source.last_mut() {
                *slot = bar.clone();
            }
            if query_final {
                indicator.value_at(&source, last)?;
            }
        } else {
            source.push(bar.clone());
            indicator.value_at(&source, last)?;
        }
    }
    Ok(source)
}

/// Bitwise equality that also treats NaN as equal to NaN.
pub fn same_value(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
}

/// Assert two indicators hold identical cached values for `0..len`.
pub fn assert_same_cache(left: &dyn ChartIndicator, right: &dyn ChartIndicator, len: usize) {
    for ix in 0..len {
        let (l, r) = (left.cached(ix), right.cached(ix));
        match (l, r) {
            (Some(l), Some(r)) => assert!(same_value(l, r), "ix {ix}: {l} != {r}"),
            _ => panic!("ix {ix}: missing value ({l:?} vs {r:?})"),
        }
    }
}
