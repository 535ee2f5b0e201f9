use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::models::{OhlcvBar, OhlcvSeries, RawRow};
use crate::utils::errors::NormalizeError;

pub const TIMESTAMP: &str = "timestamp";
pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";

/// Counters describing what normalization discarded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rows_received: usize,
    pub rows_dropped: usize,
    pub duplicates_removed: usize,
}

/// Validate raw rows and coerce them into an ordered OHLCV series.
/// The pipeline calls [`normalize_with_report`] to keep the counters.
#[cfg(test)]
pub fn normalize(rows: &[RawRow]) -> Result<OhlcvSeries, NormalizeError> {
    normalize_with_report(rows).map(|(series, _)| series)
}

/// Like [`normalize`], also reporting dropped rows and duplicate timestamps.
///
/// `timestamp` and `close` must appear in the schema (the union of keys over
/// all rows). Optional columns that never appear are filled from `close`
/// (prices) or with zero (volume). A row whose value for a present column
/// cannot be coerced is dropped on its own. Duplicate timestamps keep the
/// last occurrence.
pub fn normalize_with_report(rows: &[RawRow]) -> Result<(OhlcvSeries, NormalizeReport), NormalizeError> {
    let mut report = NormalizeReport {
        rows_received: rows.len(),
        ..Default::default()
    };

    if rows.is_empty() {
        return Ok((OhlcvSeries::default(), report));
    }

    let schema: BTreeSet<&str> = rows.iter().flat_map(|row| row.keys().map(String::as_str)).collect();
    for required in [TIMESTAMP, CLOSE] {
        if !schema.contains(required) {
            return Err(NormalizeError::MissingColumn { column: required });
        }
    }

    let columns = Columns {
        open: schema.contains(OPEN),
        high: schema.contains(HIGH),
        low: schema.contains(LOW),
        volume: schema.contains(VOLUME),
    };

    let mut bars: Vec<OhlcvBar> = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        match coerce_row(row, &columns) {
            Some(bar) => bars.push(bar),
            None => {
                debug!("Dropping row {}: non-numeric or missing value", i);
                report.rows_dropped += 1;
            }
        }
    }

    // Stable sort keeps input order within equal timestamps, so the last
    // occurrence is the last element of each run.
    bars.sort_by_key(|b| b.timestamp);
    let before = bars.len();
    let mut deduped: Vec<OhlcvBar> = Vec::with_capacity(before);
    for bar in bars {
        match deduped.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => deduped.push(bar),
        }
    }
    report.duplicates_removed = before - deduped.len();

    Ok((OhlcvSeries::from_sorted(deduped), report))
}

struct Columns {
    open: bool,
    high: bool,
    low: bool,
    volume: bool,
}

fn coerce_row(row: &RawRow, columns: &Columns) -> Option<OhlcvBar> {
    let timestamp = coerce_timestamp(row.get(TIMESTAMP)?)?;
    let close = coerce_f64(row.get(CLOSE)?)?;

    let optional = |present: bool, key: &str, fallback: f64| -> Option<f64> {
        if present {
            coerce_f64(row.get(key)?)
        } else {
            Some(fallback)
        }
    };

    Some(OhlcvBar {
        timestamp,
        open: optional(columns.open, OPEN, close)?,
        high: optional(columns.high, HIGH, close)?,
        low: optional(columns.low, LOW, close)?,
        close,
        volume: optional(columns.volume, VOLUME, 0.0)?,
    })
}

/// Numbers and numeric strings; anything non-finite fails
fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// Integer epoch milliseconds, as a number or a string
fn coerce_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn full_row(ts: i64, close: f64) -> RawRow {
        row(json!({
            "timestamp": ts,
            "open": close - 1.0,
            "high": close + 2.0,
            "low": close - 2.0,
            "close": close,
            "volume": 10.0,
        }))
    }

    fn as_rows(series: &OhlcvSeries) -> Vec<RawRow> {
        series
            .bars()
            .iter()
            .map(|b| {
                row(json!({
                    "timestamp": b.timestamp,
                    "open": b.open,
                    "high": b.high,
                    "low": b.low,
                    "close": b.close,
                    "volume": b.volume,
                }))
            })
            .collect()
    }

    #[test]
    fn test_missing_close_column() {
        let rows = vec![row(json!({"timestamp": 1, "open": 1.0}))];
        assert_eq!(normalize(&rows), Err(NormalizeError::MissingColumn { column: "close" }));
    }

    #[test]
    fn test_missing_timestamp_column() {
        let rows = vec![row(json!({"close": 1.0}))];
        assert_eq!(normalize(&rows), Err(NormalizeError::MissingColumn { column: "timestamp" }));
    }

    #[test]
    fn test_empty_input_is_empty_series() {
        let (series, report) = normalize_with_report(&[]).unwrap();
        assert!(series.is_empty());
        assert_eq!(report, NormalizeReport::default());
    }

    #[test]
    fn test_string_values_are_coerced() {
        let rows = vec![row(json!({
            "timestamp": "1700000000000",
            "open": "1.5", "high": "2.0", "low": "1.0", "close": "1.75", "volume": " 12 ",
        }))];
        let series = normalize(&rows).unwrap();
        assert_eq!(
            series.bars(),
            &[OhlcvBar { timestamp: 1_700_000_000_000, open: 1.5, high: 2.0, low: 1.0, close: 1.75, volume: 12.0 }]
        );
    }

    #[test]
    fn test_bad_volume_drops_only_that_row() {
        let mut bad = full_row(2, 11.0);
        bad.insert("volume".to_string(), json!("n/a"));
        let rows = vec![full_row(1, 10.0), bad, full_row(3, 12.0)];

        let (series, report) = normalize_with_report(&rows).unwrap();
        assert_eq!(series.timestamps(), vec![1, 3]);
        assert_eq!(report.rows_received, 3);
        assert_eq!(report.rows_dropped, 1);
    }

    #[test]
    fn test_row_missing_present_column_is_dropped() {
        let mut partial = full_row(2, 11.0);
        partial.remove("high");
        let rows = vec![full_row(1, 10.0), partial];
        assert_eq!(normalize(&rows).unwrap().timestamps(), vec![1]);
    }

    #[test]
    fn test_absent_optional_columns_fall_back() {
        let rows = vec![row(json!({"timestamp": 5, "close": 42.0}))];
        let bar = normalize(&rows).unwrap().bars()[0];
        assert_eq!((bar.open, bar.high, bar.low, bar.volume), (42.0, 42.0, 42.0, 0.0));
    }

    #[test]
    fn test_non_finite_and_null_rejected() {
        let rows = vec![
            row(json!({"timestamp": 1, "close": "inf"})),
            row(json!({"timestamp": 2, "close": null})),
            row(json!({"timestamp": 3, "close": true})),
            row(json!({"timestamp": "soon", "close": 1.0})),
            row(json!({"timestamp": 4, "close": "NaN"})),
        ];
        let (series, report) = normalize_with_report(&rows).unwrap();
        assert!(series.is_empty());
        assert_eq!(report.rows_dropped, 5);
    }

    #[test]
    fn test_sorts_and_keeps_last_duplicate() {
        let rows = vec![full_row(3, 30.0), full_row(1, 10.0), full_row(3, 31.0), full_row(2, 20.0)];
        let (series, report) = normalize_with_report(&rows).unwrap();
        assert_eq!(series.timestamps(), vec![1, 2, 3]);
        assert_eq!(series.closes(), vec![10.0, 20.0, 31.0]);
        assert_eq!(report.duplicates_removed, 1);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let rows = vec![full_row(9, 1.0), full_row(4, 2.0), full_row(9, 3.0), full_row(7, 4.0)];
        let once = normalize(&rows).unwrap();
        let twice = normalize(&as_rows(&once)).unwrap();
        assert_eq!(once, twice);
        assert!(once.bars().windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
