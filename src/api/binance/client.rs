use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use super::models::{klines_to_rows, ErrorResponse, Kline};
use crate::models::RawRow;
use crate::services::pipeline::DataFetcher;
use crate::utils::errors::FetchError;

/// Binance spot market data client (public endpoints, no API key)
pub struct BinanceClient {
    http_client: HttpClient,
    base_url: String,
    limit: u16,
}

impl BinanceClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.binance.com";

    /// Create a client returning up to `limit` klines per request.
    /// `base_url` is usually [`Self::DEFAULT_BASE_URL`]; testnet and mirrors work too.
    pub fn with_base_url(base_url: String, limit: u16) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            limit,
        }
    }

    /// Seconds from the `Retry-After` header, if present
    fn extract_retry_after(response: &reqwest::Response) -> Option<u64> {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }

    /// Map a non-success response onto a [`FetchError`]
    async fn handle_error_response(response: reqwest::Response) -> FetchError {
        let status = response.status().as_u16();
        let retry_after = Self::extract_retry_after(&response);
        let body_text = response.text().await.unwrap_or_default();
        error_from_status(status, &body_text, retry_after)
    }

    /// GET /api/v3/klines
    ///
    /// # Arguments
    /// * `symbol` - Exchange symbol, e.g. `BTCUSDT`
    /// * `interval` - Kline interval, e.g. `1d`
    ///
    /// # Returns
    /// * `Ok(Vec<Kline>)` - Oldest first, at most `limit` entries
    /// * `Err(FetchError)` - HTTP, transport or body errors
    pub async fn get_klines(&self, symbol: &str, interval: &str) -> Result<Vec<Kline>, FetchError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = self.limit.to_string();
        debug!("GET {} symbol={} interval={} limit={}", url, symbol, interval, limit);

        let response = self
            .http_client
            .get(&url)
            .query(&[("symbol", symbol), ("interval", interval), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::RequestError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        response
            .json::<Vec<Kline>>()
            .await
            .map_err(|e| FetchError::DeserializationError(format!("Failed to parse klines: {}", e)))
    }
}

#[async_trait]
impl DataFetcher for BinanceClient {
    async fn fetch(&self, symbol: &str, interval: &str) -> Result<Vec<RawRow>, FetchError> {
        let klines = self.get_klines(symbol, interval).await?;
        debug!("Received {} klines for {} ({})", klines.len(), symbol, interval);
        Ok(klines_to_rows(klines))
    }
}

fn error_from_status(status: u16, body_text: &str, retry_after: Option<u64>) -> FetchError {
    match status {
        400 => {
            let message = serde_json::from_str::<ErrorResponse>(body_text)
                .ok()
                .and_then(|e| e.msg)
                .unwrap_or_else(|| body_text.to_string());
            FetchError::BadRequest(message)
        }
        // 418 is Binance's escalation after ignoring 429s
        418 | 429 => {
            warn!("Rate limited by Binance ({}), retry after {:?} s", status, retry_after);
            FetchError::RateLimited { retry_after_secs: retry_after }
        }
        500..=599 => {
            warn!("Server error {}: {}", status, body_text);
            FetchError::ServerError(status, body_text.to_string())
        }
        _ => FetchError::HttpError(status, body_text.to_string()),
    }
}
