use thiserror::Error;

/// Schema problems found while normalizing raw rows
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("required column '{column}' is missing")]
    MissingColumn { column: &'static str },
}

/// Failures of the market data collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Rate Limited{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("Server Error ({0}): {1}")]
    ServerError(u16, String),
    #[error("HTTP Error ({0}): {1}")]
    HttpError(u16, String),
    #[error("Request Error: {0}")]
    RequestError(String),
    #[error("Deserialization Error: {0}")]
    DeserializationError(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(". Retry after {} s", secs),
        None => String::new(),
    }
}

/// Failures of the chart render collaborator
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing failed while {stage}: {message}")]
    Backend { stage: &'static str, message: String },
    #[error("chart image file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("render worker failed: {0}")]
    Task(String),
    #[error("renderer produced empty image data")]
    EmptyImage,
}

impl RenderError {
    /// Adapter for `map_err` on plotters results
    pub fn backend<E: std::fmt::Display>(stage: &'static str) -> impl FnOnce(E) -> RenderError {
        move |e| RenderError::Backend { stage, message: e.to_string() }
    }
}

/// Pipeline step at which a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Normalize,
    Render,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Render => "render",
        };
        f.write_str(name)
    }
}

/// Fatal outcome of a chart request. No artifact is produced on any of these.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("{symbol} {interval}: required column '{column}' missing from market data")]
    MissingColumn {
        symbol: String,
        interval: String,
        column: &'static str,
    },
    #[error("{symbol} {interval}: market data unavailable: {source}")]
    DataUnavailable {
        symbol: String,
        interval: String,
        #[source]
        source: FetchError,
    },
    #[error("{symbol} {interval}: chart rendering failed: {source}")]
    Render {
        symbol: String,
        interval: String,
        #[source]
        source: RenderError,
    },
}

impl ChartError {
    pub fn stage(&self) -> Stage {
        match self {
            ChartError::MissingColumn { .. } => Stage::Normalize,
            ChartError::DataUnavailable { .. } => Stage::Fetch,
            ChartError::Render { .. } => Stage::Render,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            ChartError::MissingColumn { symbol, .. }
            | ChartError::DataUnavailable { symbol, .. }
            | ChartError::Render { symbol, .. } => symbol,
        }
    }

    pub fn interval(&self) -> &str {
        match self {
            ChartError::MissingColumn { interval, .. }
            | ChartError::DataUnavailable { interval, .. }
            | ChartError::Render { interval, .. } => interval,
        }
    }

    /// Short text suitable for a chat reply
    pub fn user_message(&self) -> String {
        match self {
            ChartError::MissingColumn { symbol, interval, column } => format!(
                "❌ Market data for {} ({}) has no '{}' column, cannot build a chart.",
                symbol, interval, column
            ),
            ChartError::DataUnavailable { symbol, interval, source } => match source {
                FetchError::BadRequest(msg) => {
                    format!("❌ Could not get data for {} ({}): {}", symbol, interval, msg)
                }
                FetchError::RateLimited { .. } => {
                    "⚠️ **Rate Limited**: the market data provider is busy. Please try again in a moment.".to_string()
                }
                _ => format!("⚠️ Market data for {} ({}) is unavailable right now.", symbol, interval),
            },
            ChartError::Render { symbol, interval, .. } => {
                format!("❌ Failed to draw the chart for {} ({}).", symbol, interval)
            }
        }
    }
}
