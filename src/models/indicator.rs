//! Indicator kinds, their static styling table and computed series

use plotters::style::{RGBColor, BLUE, CYAN, GREEN, MAGENTA, RED};

const ORANGE: RGBColor = RGBColor(255, 165, 0);
const PURPLE: RGBColor = RGBColor(128, 0, 128);

/// Indicators the bot knows how to compute and draw.
///
/// Declaration order is the auxiliary panel priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndicatorKind {
    Rsi,
    Macd,
    BollingerBands,
    Stochastic,
}

/// Where an indicator is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Shares the price scale, drawn on panel 0
    PriceOverlay,
    /// Gets its own panel below the price panel
    SubPanel,
}

/// Color and legend label of one output line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub label: &'static str,
    pub color: RGBColor,
}

/// Static metadata for one indicator kind
#[derive(Debug)]
pub struct IndicatorDescriptor {
    pub kind: IndicatorKind,
    pub name: &'static str,
    pub placement: Placement,
    /// One entry per output series, in the order the engine produces them
    pub lines: &'static [LineStyle],
    /// Fixed value scale for bounded oscillators
    pub bounds: Option<(f64, f64)>,
}

static DESCRIPTORS: [IndicatorDescriptor; 4] = [
    IndicatorDescriptor {
        kind: IndicatorKind::Rsi,
        name: "RSI",
        placement: Placement::SubPanel,
        lines: &[LineStyle { label: "RSI", color: BLUE }],
        bounds: Some((0.0, 100.0)),
    },
    IndicatorDescriptor {
        kind: IndicatorKind::Macd,
        name: "MACD",
        placement: Placement::SubPanel,
        lines: &[
            LineStyle { label: "MACD Line", color: ORANGE },
            LineStyle { label: "MACD Signal", color: RED },
        ],
        bounds: None,
    },
    IndicatorDescriptor {
        kind: IndicatorKind::BollingerBands,
        name: "Bollinger Bands",
        placement: Placement::PriceOverlay,
        lines: &[
            LineStyle { label: "Bollinger Upper", color: GREEN },
            LineStyle { label: "Bollinger Lower", color: PURPLE },
        ],
        bounds: None,
    },
    IndicatorDescriptor {
        kind: IndicatorKind::Stochastic,
        name: "Stochastic",
        placement: Placement::SubPanel,
        lines: &[
            LineStyle { label: "Stochastic K", color: CYAN },
            LineStyle { label: "Stochastic D", color: MAGENTA },
        ],
        bounds: Some((0.0, 100.0)),
    },
];

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 4] = [
        IndicatorKind::Rsi,
        IndicatorKind::Macd,
        IndicatorKind::BollingerBands,
        IndicatorKind::Stochastic,
    ];

    pub fn descriptor(self) -> &'static IndicatorDescriptor {
        match self {
            IndicatorKind::Rsi => &DESCRIPTORS[0],
            IndicatorKind::Macd => &DESCRIPTORS[1],
            IndicatorKind::BollingerBands => &DESCRIPTORS[2],
            IndicatorKind::Stochastic => &DESCRIPTORS[3],
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Look up a kind by its display name or a common alias (case-insensitive).
    /// Unknown names yield `None` rather than an error.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "rsi" => Some(IndicatorKind::Rsi),
            "macd" => Some(IndicatorKind::Macd),
            "bollinger bands" | "bollinger" | "bb" | "bbands" => Some(IndicatorKind::BollingerBands),
            "stochastic" | "stoch" | "kd" => Some(IndicatorKind::Stochastic),
            _ => None,
        }
    }

    /// Whether `name` is the "every indicator" shortcut
    pub fn is_all_shortcut(name: &str) -> bool {
        let lowered = name.trim().to_lowercase();
        lowered == "all" || lowered == "усі"
    }
}

/// A time-aligned indicator output.
///
/// `values[i]` belongs to bar `i` of the source series; `None` marks the
/// warm-up positions where the indicator has no value yet.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self { name: name.into(), values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Index of the first defined value
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(|v| v.is_some())
    }

    /// (min, max) over the defined values
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values.iter().flatten().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
