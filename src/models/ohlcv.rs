//! OHLCV market data models

use serde_json::{Map, Value};

/// One raw record as handed over by a data-fetch collaborator.
///
/// Rows are heterogeneous: keys and value types are only checked by the
/// normalizer.
pub type RawRow = Map<String, Value>;

/// One time-indexed candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OhlcvBar {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candles ordered by strictly increasing timestamp.
///
/// Only the normalizer builds one, so the ordering holds for every instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OhlcvSeries {
    bars: Vec<OhlcvBar>,
}

impl OhlcvSeries {
    pub(crate) fn from_sorted(bars: Vec<OhlcvBar>) -> Self {
        debug_assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { bars }
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }
}
