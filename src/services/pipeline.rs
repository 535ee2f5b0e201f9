//! Chart request pipeline: fetch → normalize → compute → compose → render.
//!
//! The pipeline owns no mutable state; every `run` works on its own data
//! and the two collaborators are the only places that may suspend.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::models::{
    ChartArtifact, ChartOutcome, ChartRequest, Diagnostics, IndicatorKind, OhlcvSeries, PanelSpec, RawRow,
};
use crate::services::normalizer::{self, NormalizeReport};
use crate::services::plot_composer::{self, IndicatorSeriesMap};
use crate::services::indicator_service;
use crate::utils::errors::{ChartError, FetchError, NormalizeError, RenderError};

/// Source of raw market data rows
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(&self, symbol: &str, interval: &str) -> Result<Vec<RawRow>, FetchError>;
}

/// Turns a series plus its panel layout into PNG bytes
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, title: &str, series: &OhlcvSeries, panels: &[PanelSpec]) -> Result<Vec<u8>, RenderError>;
}

pub struct ChartPipeline<F, R> {
    fetcher: F,
    renderer: R,
}

impl<F: DataFetcher, R: ChartRenderer> ChartPipeline<F, R> {
    pub fn new(fetcher: F, renderer: R) -> Self {
        Self { fetcher, renderer }
    }

    /// Run one request to completion. No retries; every fatal error names the
    /// failing stage and the request's symbol and interval.
    pub async fn run(&self, request: &ChartRequest) -> Result<ChartOutcome, ChartError> {
        let symbol = request.symbol.as_str();
        let interval = request.interval.as_str();
        info!("📈 Chart pipeline started for {} ({}) with {:?}", symbol, interval, request.indicators);

        let rows = self.fetcher.fetch(symbol, interval).await.map_err(|source| {
            warn!("Market data fetch failed for {} ({}): {}", symbol, interval, source);
            ChartError::DataUnavailable {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
                source,
            }
        })?;
        debug!("Fetched {} raw rows", rows.len());

        let (series, report) = normalizer::normalize_with_report(&rows).map_err(|e| match e {
            NormalizeError::MissingColumn { column } => {
                warn!("Market data for {} ({}) lacks column '{}'", symbol, interval, column);
                ChartError::MissingColumn {
                    symbol: symbol.to_string(),
                    interval: interval.to_string(),
                    column,
                }
            }
        })?;
        if series.is_empty() {
            warn!("No usable bars for {} ({}), rendering an empty chart", symbol, interval);
        }

        let (kinds, ignored) = resolve_indicators(&request.indicators);
        if !ignored.is_empty() {
            debug!("Ignoring unknown indicators: {:?}", ignored);
        }

        let computed: IndicatorSeriesMap = kinds
            .iter()
            .map(|&kind| (kind, indicator_service::compute(kind, &series)))
            .collect();
        for output in computed.values().flatten() {
            debug!(
                "{}: {} of {} points defined, first at {:?}",
                output.name,
                output.defined_count(),
                output.len(),
                output.first_defined()
            );
        }
        let panels = plot_composer::compose(&kinds, &computed);
        debug!("Composed {} panel(s)", panels.len());

        let diagnostics = build_diagnostics(&series, report, &kinds, ignored, &computed);

        let title = format!("{} ({})", symbol, interval);
        let bytes = self
            .renderer
            .render(&title, &series, &panels)
            .await
            .and_then(|bytes| if bytes.is_empty() { Err(RenderError::EmptyImage) } else { Ok(bytes) })
            .map_err(|source| ChartError::Render {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
                source,
            })?;

        info!("✓ Chart for {} ({}) rendered: {} bytes, {} bars", symbol, interval, bytes.len(), series.len());
        Ok(ChartOutcome {
            artifact: ChartArtifact::png(bytes),
            diagnostics,
        })
    }
}

/// Map requested names onto known kinds. `all` expands to every kind;
/// names that match nothing are returned separately instead of failing.
pub fn resolve_indicators(names: &[String]) -> (BTreeSet<IndicatorKind>, Vec<String>) {
    let mut kinds = BTreeSet::new();
    let mut ignored = Vec::new();
    for name in names {
        if IndicatorKind::is_all_shortcut(name) {
            kinds.extend(IndicatorKind::ALL);
        } else if let Some(kind) = IndicatorKind::from_name(name) {
            kinds.insert(kind);
        } else {
            ignored.push(name.clone());
        }
    }
    (kinds, ignored)
}

fn build_diagnostics(
    series: &OhlcvSeries,
    report: NormalizeReport,
    kinds: &BTreeSet<IndicatorKind>,
    ignored: Vec<String>,
    computed: &IndicatorSeriesMap,
) -> Diagnostics {
    Diagnostics {
        rows_received: report.rows_received,
        rows_dropped: report.rows_dropped,
        duplicates_removed: report.duplicates_removed,
        bars: series.len(),
        ignored_indicators: ignored,
        defined_points: computed
            .values()
            .flatten()
            .map(|s| (s.name.clone(), s.defined_count()))
            .collect(),
        indicators: kinds.iter().copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    struct StaticFetcher {
        rows: Result<Vec<RawRow>, FetchError>,
    }

    #[async_trait]
    impl DataFetcher for StaticFetcher {
        async fn fetch(&self, _symbol: &str, _interval: &str) -> Result<Vec<RawRow>, FetchError> {
            self.rows.clone()
        }
    }

    /// Records what it was asked to draw
    #[derive(Default)]
    struct RecordingRenderer {
        calls: AtomicUsize,
        panels: Mutex<Vec<PanelSpec>>,
        fail: bool,
    }

    #[async_trait]
    impl ChartRenderer for RecordingRenderer {
        async fn render(&self, _title: &str, _series: &OhlcvSeries, panels: &[PanelSpec]) -> Result<Vec<u8>, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.panels.lock().unwrap() = panels.to_vec();
            if self.fail {
                return Err(RenderError::Backend { stage: "drawing candles", message: "boom".to_string() });
            }
            Ok(FAKE_PNG.to_vec())
        }
    }

    fn rows(values: Vec<serde_json::Value>) -> Vec<RawRow> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn rising_rows(n: usize) -> Vec<RawRow> {
        rows(
            (0..n)
                .map(|i| {
                    let close = 100.0 + i as f64;
                    json!({
                        "timestamp": 1_700_000_000_000i64 + i as i64 * 86_400_000,
                        "open": close - 0.5,
                        "high": close + 1.0,
                        "low": close - 1.0,
                        "close": close,
                        "volume": 1000.0,
                    })
                })
                .collect(),
        )
    }

    fn request(indicators: &[&str]) -> ChartRequest {
        ChartRequest::new("BTCUSDT", "1d", indicators.iter().map(|s| s.to_string()).collect())
    }

    fn pipeline(rows: Result<Vec<RawRow>, FetchError>) -> ChartPipeline<StaticFetcher, RecordingRenderer> {
        ChartPipeline::new(StaticFetcher { rows }, RecordingRenderer::default())
    }

    #[tokio::test]
    async fn test_short_series_still_renders() {
        let pipeline = pipeline(Ok(rising_rows(5)));
        let outcome = pipeline.run(&request(&["RSI"])).await.unwrap();

        assert_eq!(outcome.artifact.bytes, FAKE_PNG);
        assert_eq!(outcome.diagnostics.bars, 5);
        assert_eq!(outcome.diagnostics.defined_points.get("RSI"), Some(&0));

        let panels = pipeline.renderer.panels.lock().unwrap();
        assert_eq!(panels.len(), 2);
        assert!(panels[1].lines[0].series.values.iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_missing_close_fails_before_render() {
        let pipeline = pipeline(Ok(rows(vec![json!({"timestamp": 1, "open": 1.0, "volume": 3.0})])));
        let err = pipeline.run(&request(&["all"])).await.unwrap_err();

        assert!(matches!(err, ChartError::MissingColumn { column: "close", .. }));
        assert_eq!(err.stage(), crate::utils::errors::Stage::Normalize);
        assert_eq!(pipeline.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_volume_row_dropped() {
        let mut data = rising_rows(30);
        data[10].insert("volume".to_string(), json!("not-a-number"));
        let pipeline = pipeline(Ok(data));
        let outcome = pipeline.run(&request(&["MACD"])).await.unwrap();

        assert_eq!(outcome.diagnostics.rows_received, 30);
        assert_eq!(outcome.diagnostics.rows_dropped, 1);
        assert_eq!(outcome.diagnostics.bars, 29);
        assert_eq!(pipeline.renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_data_unavailable() {
        let pipeline = pipeline(Err(FetchError::RequestError("connection reset".to_string())));
        let err = pipeline.run(&request(&["RSI"])).await.unwrap_err();
        assert!(matches!(err, ChartError::DataUnavailable { .. }));
        assert_eq!(err.symbol(), "BTCUSDT");
    }

    #[tokio::test]
    async fn test_render_failure_surfaces() {
        let pipeline = ChartPipeline::new(
            StaticFetcher { rows: Ok(rising_rows(40)) },
            RecordingRenderer { fail: true, ..Default::default() },
        );
        let err = pipeline.run(&request(&["Stochastic"])).await.unwrap_err();
        assert!(matches!(err, ChartError::Render { .. }));
        assert_eq!(pipeline.renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_data_renders_price_panel() {
        let pipeline = pipeline(Ok(Vec::new()));
        let outcome = pipeline.run(&request(&["Bollinger Bands", "Ichimoku"])).await.unwrap();

        assert_eq!(outcome.diagnostics.bars, 0);
        assert_eq!(outcome.diagnostics.ignored_indicators, vec!["Ichimoku".to_string()]);
        assert_eq!(outcome.diagnostics.indicators, vec![IndicatorKind::BollingerBands]);
        let panels = pipeline.renderer.panels.lock().unwrap();
        assert_eq!(panels.len(), 1);
    }

    #[tokio::test]
    async fn test_all_indicators_layout() {
        let pipeline = pipeline(Ok(rising_rows(60)));
        let outcome = pipeline.run(&request(&["all"])).await.unwrap();

        assert_eq!(outcome.diagnostics.indicators, IndicatorKind::ALL.to_vec());
        let panels = pipeline.renderer.panels.lock().unwrap();
        let titles: Vec<&str> = panels.iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["Price", "RSI", "MACD", "Stochastic"]);
        assert_eq!(panels[0].lines.len(), 2);
    }

    #[test]
    fn test_resolve_indicators() {
        let names: Vec<String> = ["rsi", "RSI", "bogus", "bb"].iter().map(|s| s.to_string()).collect();
        let (kinds, ignored) = resolve_indicators(&names);
        assert_eq!(kinds, BTreeSet::from([IndicatorKind::Rsi, IndicatorKind::BollingerBands]));
        assert_eq!(ignored, vec!["bogus".to_string()]);
    }
}
