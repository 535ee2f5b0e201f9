//! Data models for the indicator chart bot
//!
//! Market data, indicator series, panel layout and the chart request/result
//! types passed between the pipeline stages.

pub mod chart;
pub mod indicator;
pub mod ohlcv;
pub mod panel;

// Re-export commonly used types for convenience
pub use chart::{ChartArtifact, ChartOutcome, ChartRequest, Diagnostics};
pub use indicator::{IndicatorKind, IndicatorSeries, Placement};
pub use ohlcv::{OhlcvBar, OhlcvSeries, RawRow};
pub use panel::{PanelLine, PanelRole, PanelSpec};
