//! Chart panel layout models

use plotters::style::RGBColor;

use super::indicator::IndicatorSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelRole {
    /// Panel 0: candles plus price-scale overlays
    Price,
    /// A separate panel with its own value scale
    SubPanel,
}

/// One line drawn on a panel
#[derive(Debug, Clone, PartialEq)]
pub struct PanelLine {
    pub series: IndicatorSeries,
    pub color: RGBColor,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelSpec {
    /// 0 is the price panel, auxiliary panels count up from 1
    pub index: usize,
    pub role: PanelRole,
    /// Panel title for sub-panels, e.g. "MACD"
    pub title: &'static str,
    pub lines: Vec<PanelLine>,
    /// Fixed value scale; `None` fits the scale to the data
    pub bounds: Option<(f64, f64)>,
}

impl PanelSpec {
    pub fn price() -> Self {
        Self {
            index: 0,
            role: PanelRole::Price,
            title: "Price",
            lines: Vec::new(),
            bounds: None,
        }
    }

    pub fn is_overlay(&self) -> bool {
        self.role == PanelRole::Price
    }

    /// Combined (min, max) over every line's defined values
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.lines
            .iter()
            .filter_map(|line| line.series.range())
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }
}
