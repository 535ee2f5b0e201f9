use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::RawRow;
use crate::services::normalizer::{CLOSE, HIGH, LOW, OPEN, TIMESTAMP, VOLUME};

/// Kline intervals accepted by `/api/v3/klines`
pub const SUPPORTED_INTERVALS: [&str; 15] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Interval strings are case-sensitive ("1m" is a minute, "1M" a month)
pub fn is_supported_interval(interval: &str) -> bool {
    SUPPORTED_INTERVALS.contains(&interval)
}

/// Error body returned by the API, e.g. `{"code":-1121,"msg":"Invalid symbol."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: Option<i64>,
    pub msg: Option<String>,
}

/// One kline is a positional array:
/// `[open_time, open, high, low, close, volume, close_time, ...]`
pub type Kline = Vec<Value>;

const KLINE_COLUMNS: [&str; 6] = [TIMESTAMP, OPEN, HIGH, LOW, CLOSE, VOLUME];

/// Turn positional klines into keyed raw rows.
///
/// Values are passed through untouched (prices arrive as decimal strings);
/// coercion is left to the normalizer. Short arrays simply yield rows with
/// fewer keys.
pub fn klines_to_rows(klines: Vec<Kline>) -> Vec<RawRow> {
    klines
        .into_iter()
        .map(|kline| {
            let mut row = Map::new();
            for (key, value) in KLINE_COLUMNS.iter().zip(kline) {
                row.insert(key.to_string(), value);
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_klines_to_rows() {
        let body = json!([
            [1700000000000i64, "36000.1", "36500.0", "35800.5", "36200.0", "1234.5", 1700086399999i64, "x", 10, "y", "z", "0"],
            [1700086400000i64, "36200.0", "37000.0"]
        ]);
        let klines: Vec<Kline> = serde_json::from_value(body).unwrap();
        let rows = klines_to_rows(klines);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["timestamp"], json!(1700000000000i64));
        assert_eq!(rows[0]["close"], json!("36200.0"));
        assert_eq!(rows[0]["volume"], json!("1234.5"));
        assert_eq!(rows[0].len(), 6);
        assert!(rows[1].get("close").is_none());
    }

    #[test]
    fn test_supported_intervals() {
        assert!(is_supported_interval("1d"));
        assert!(is_supported_interval("1M"));
        assert!(!is_supported_interval("2d"));
        assert!(!is_supported_interval("1D"));
    }

    #[test]
    fn test_error_body_parses() {
        let err: ErrorResponse = serde_json::from_str(r#"{"code":-1121,"msg":"Invalid symbol."}"#).unwrap();
        assert_eq!(err.code, Some(-1121));
        assert_eq!(err.msg.as_deref(), Some("Invalid symbol."));
    }
}
