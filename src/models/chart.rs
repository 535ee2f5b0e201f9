//! Chart request / result models

use std::collections::BTreeMap;

use super::indicator::IndicatorKind;

/// Input of one chart pipeline run
#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub symbol: String,
    pub interval: String,
    /// Requested indicator names as typed by the user; unknown names are ignored
    pub indicators: Vec<String>,
}

impl ChartRequest {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>, indicators: Vec<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            indicators,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
        }
    }
}

/// Rendered chart image
#[derive(Debug, Clone, PartialEq)]
pub struct ChartArtifact {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ChartArtifact {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self { bytes, format: ImageFormat::Png }
    }

    /// Attachment name, e.g. `chart_BTCUSDT_1d.png`
    pub fn file_name(&self, symbol: &str, interval: &str) -> String {
        format!("chart_{}_{}.{}", symbol, interval, self.format.extension())
    }
}

/// What happened during one pipeline run, returned next to the artifact
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub rows_received: usize,
    pub rows_dropped: usize,
    pub duplicates_removed: usize,
    pub bars: usize,
    pub ignored_indicators: Vec<String>,
    /// Defined (non warm-up) points per computed output series
    pub defined_points: BTreeMap<String, usize>,
    pub indicators: Vec<IndicatorKind>,
}

/// Successful pipeline result
#[derive(Debug, Clone)]
pub struct ChartOutcome {
    pub artifact: ChartArtifact,
    pub diagnostics: Diagnostics,
}
