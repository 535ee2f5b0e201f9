use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use uuid::Uuid;

use crate::models::{OhlcvSeries, PanelLine, PanelSpec};
use crate::services::pipeline::ChartRenderer;
use crate::utils::errors::RenderError;

type PanelChart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const CANDLE_UP: RGBColor = RGBColor(38, 166, 91);
const CANDLE_DOWN: RGBColor = RGBColor(214, 69, 65);

// Relative panel heights
const PRICE_WEIGHT: u32 = 5;
const VOLUME_WEIGHT: u32 = 1;
const SUB_PANEL_WEIGHT: u32 = 2;
/// Floor for the volume strip so its axis stays legible next to many sub-panels
const MIN_VOLUME_HEIGHT: u32 = 120;

/// Fixed canvas and style settings
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub show_volume: bool,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            show_volume: true,
        }
    }
}

/// Candlestick renderer backed by plotters' bitmap backend
pub struct PlottersRenderer {
    style: ChartStyle,
    temp_dir: PathBuf,
}

impl PlottersRenderer {
    pub fn new(style: ChartStyle) -> Self {
        Self {
            style,
            temp_dir: std::env::temp_dir(),
        }
    }
}

#[async_trait]
impl ChartRenderer for PlottersRenderer {
    async fn render(&self, title: &str, series: &OhlcvSeries, panels: &[PanelSpec]) -> Result<Vec<u8>, RenderError> {
        let style = self.style.clone();
        let title = title.to_string();
        let series = series.clone();
        let panels = panels.to_vec();
        let temp_file = self.temp_dir.join(format!("indicator_chart_{}.png", Uuid::new_v4()));

        tracing::debug!("Rendering {} panel(s) to {}", panels.len(), temp_file.display());
        tokio::task::spawn_blocking(move || render_png(&temp_file, &style, &title, &series, &panels))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?
    }
}

/// Draw into a temporary PNG, read it back and remove the file
fn render_png(
    temp_file: &Path,
    style: &ChartStyle,
    title: &str,
    series: &OhlcvSeries,
    panels: &[PanelSpec],
) -> Result<Vec<u8>, RenderError> {
    let result = draw_chart(temp_file, style, title, series, panels)
        .and_then(|_| fs::read(temp_file).map_err(RenderError::from));

    if let Err(e) = fs::remove_file(temp_file) {
        tracing::warn!("Failed to delete temporary chart file {}: {}", temp_file.display(), e);
    }

    result
}

fn draw_chart(
    temp_file: &Path,
    style: &ChartStyle,
    title: &str,
    series: &OhlcvSeries,
    panels: &[PanelSpec],
) -> Result<(), RenderError> {
    let root = BitMapBackend::new(temp_file, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE).map_err(RenderError::backend("filling canvas"))?;
    let root = root
        .titled(title, ("sans-serif", 40.0).into_font())
        .map_err(RenderError::backend("drawing title"))?;

    let price_panel = panels.iter().find(|p| p.is_overlay());
    let sub_panels: Vec<&PanelSpec> = panels.iter().filter(|p| !p.is_overlay()).collect();

    let (_, height) = root.dim_in_pixel();
    let heights = panel_heights(height, style.show_volume, sub_panels.len());

    let (price_area, mut rest) = root.split_vertically(heights.price as i32);
    let x_range = x_range(series.len());
    let timestamps = series.timestamps();
    let x_labels = |x: &f64| date_label(&timestamps, *x);

    draw_price_panel(&price_area, series, price_panel, x_range.clone(), &x_labels)?;

    if let Some(volume_height) = heights.volume {
        let (volume_area, below) = rest.split_vertically(volume_height as i32);
        draw_volume_panel(&volume_area, series, x_range.clone())?;
        rest = below;
    }

    if !sub_panels.is_empty() {
        let areas = rest.split_evenly((sub_panels.len(), 1));
        for (area, panel) in areas.iter().zip(sub_panels) {
            draw_sub_panel(area, panel, x_range.clone(), &x_labels)?;
        }
    }

    root.present().map_err(RenderError::backend("writing image"))?;
    Ok(())
}

fn draw_price_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    series: &OhlcvSeries,
    overlays: Option<&PanelSpec>,
    x_range: Range<f64>,
    x_labels: &dyn Fn(&f64) -> String,
) -> Result<(), RenderError> {
    let candle_range = series.bars().iter().fold(None, |acc: Option<(f64, f64)>, b| match acc {
        None => Some((b.low, b.high)),
        Some((lo, hi)) => Some((lo.min(b.low), hi.max(b.high))),
    });
    let overlay_range = overlays.and_then(PanelSpec::value_range);
    let y_range = padded_range(merge_ranges(candle_range, overlay_range), None);

    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .x_label_area_size(30)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range, y_range)
        .map_err(RenderError::backend("building price chart"))?;

    chart
        .configure_mesh()
        .x_label_formatter(x_labels)
        .y_desc("Price")
        .draw()
        .map_err(RenderError::backend("drawing price mesh"))?;

    let (width, _) = area.dim_in_pixel();
    let candle_width = candle_width(width, series.len());
    chart
        .draw_series(series.bars().iter().enumerate().map(|(i, b)| {
            CandleStick::new(
                i as f64,
                b.open,
                b.high,
                b.low,
                b.close,
                CANDLE_UP.filled(),
                CANDLE_DOWN.filled(),
                candle_width,
            )
        }))
        .map_err(RenderError::backend("drawing candles"))?;

    if let Some(panel) = overlays {
        if draw_lines(&mut chart, &panel.lines)? {
            draw_legend(&mut chart)?;
        }
    }
    Ok(())
}

fn draw_volume_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    series: &OhlcvSeries,
    x_range: Range<f64>,
) -> Result<(), RenderError> {
    let max_volume = series.bars().iter().map(|b| b.volume).fold(0.0, f64::max);
    let y_max = if max_volume > 0.0 { max_volume * 1.1 } else { 1.0 };

    // Dates are labelled on the price panel above, so no x label area here
    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .margin_top(4)
        .margin_bottom(4)
        .x_label_area_size(0)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range, 0.0..y_max)
        .map_err(RenderError::backend("building volume chart"))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Volume")
        .y_labels(3)
        .y_label_formatter(&|v: &f64| compact_number(*v))
        .draw()
        .map_err(RenderError::backend("drawing volume mesh"))?;

    chart
        .draw_series(series.bars().iter().enumerate().map(|(i, b)| {
            let color = if b.close >= b.open { CANDLE_UP } else { CANDLE_DOWN };
            let x = i as f64;
            Rectangle::new([(x - 0.35, 0.0), (x + 0.35, b.volume)], color.mix(0.6).filled())
        }))
        .map_err(RenderError::backend("drawing volume bars"))?;
    Ok(())
}

fn draw_sub_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &PanelSpec,
    x_range: Range<f64>,
    x_labels: &dyn Fn(&f64) -> String,
) -> Result<(), RenderError> {
    let y_range = padded_range(panel.value_range(), panel.bounds);

    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .x_label_area_size(30)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range, y_range)
        .map_err(RenderError::backend("building indicator chart"))?;

    chart
        .configure_mesh()
        .x_label_formatter(x_labels)
        .y_desc(panel.title)
        .y_labels(5)
        .draw()
        .map_err(RenderError::backend("drawing indicator mesh"))?;

    if draw_lines(&mut chart, &panel.lines)? {
        draw_legend(&mut chart)?;
    }
    Ok(())
}

/// Draw each line as its defined segments. Returns whether any legend entry
/// was registered.
fn draw_lines<'a>(chart: &mut PanelChart<'a, 'a>, lines: &[PanelLine]) -> Result<bool, RenderError> {
    let mut labelled_any = false;
    for line in lines {
        let color = line.color;
        let mut labelled = false;
        for segment in defined_segments(&line.series.values) {
            let anno = chart
                .draw_series(LineSeries::new(segment, color.stroke_width(2)))
                .map_err(RenderError::backend("drawing indicator line"))?;
            if !labelled {
                anno.label(line.label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
                labelled = true;
            }
        }
        labelled_any |= labelled;
    }
    Ok(labelled_any)
}

fn draw_legend<'a>(chart: &mut PanelChart<'a, 'a>) -> Result<(), RenderError> {
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(RenderError::backend("drawing legend"))
}

struct PanelHeights {
    price: u32,
    volume: Option<u32>,
}

fn panel_heights(total: u32, show_volume: bool, sub_panels: usize) -> PanelHeights {
    let volume_weight = if show_volume { VOLUME_WEIGHT } else { 0 };
    let weights = PRICE_WEIGHT + volume_weight + SUB_PANEL_WEIGHT * sub_panels as u32;
    let unit = total / weights;
    let volume = show_volume.then(|| (unit * VOLUME_WEIGHT).max(MIN_VOLUME_HEIGHT.min(total / 4)));
    let sub_total = unit * SUB_PANEL_WEIGHT * sub_panels as u32;
    PanelHeights {
        // The price panel absorbs rounding and the volume floor
        price: total.saturating_sub(sub_total + volume.unwrap_or(0)),
        volume,
    }
}

/// `1234567.0` -> `1.2M`
fn compact_number(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format!("{:.0}", value)
    }
}

/// Bar `i` is drawn at x = i
fn x_range(bars: usize) -> Range<f64> {
    -0.5..(bars.max(1) as f64 - 0.5)
}

fn candle_width(panel_width: u32, bars: usize) -> u32 {
    if bars == 0 {
        return 1;
    }
    let per_bar = panel_width as f64 / bars as f64;
    (per_bar * 0.7).clamp(1.0, 24.0) as u32
}

/// Axis label for position `x`: the bar's UTC date, empty between bars
fn date_label(timestamps: &[i64], x: f64) -> String {
    let index = x.round();
    if index < 0.0 || (x - index).abs() > 1e-6 {
        return String::new();
    }
    timestamps
        .get(index as usize)
        .and_then(|&ms| DateTime::<Utc>::from_timestamp_millis(ms))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn merge_ranges(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    match (a, b) {
        (Some((lo1, hi1)), Some((lo2, hi2))) => Some((lo1.min(lo2), hi1.max(hi2))),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Axis range with 5% head-room. Fixed bounds win when given; an empty or
/// degenerate range is widened so the axis is never zero-sized.
fn padded_range(range: Option<(f64, f64)>, bounds: Option<(f64, f64)>) -> Range<f64> {
    if let Some((lo, hi)) = bounds {
        return lo..hi;
    }
    match range {
        None => 0.0..1.0,
        Some((lo, hi)) => {
            let span = hi - lo;
            let padding = if span > 0.0 {
                span * 0.05
            } else {
                (lo.abs() * 0.01).max(1e-8)
            };
            (lo - padding)..(hi + padding)
        }
    }
}

/// Split a series at undefined values into runs of (x, y) points
fn defined_segments(values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for (i, value) in values.iter().enumerate() {
        match value {
            Some(v) => current.push((i as f64, *v)),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
