//! Environment configuration (`.env` is loaded in `main`)

use std::str::FromStr;

use thiserror::Error;

use crate::api::binance::{is_supported_interval, BinanceClient};
use crate::services::chart_service::ChartStyle;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub binance_base_url: String,
    pub default_interval: String,
    pub kline_limit: u16,
    pub chart_style: ChartStyle,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let binance_base_url =
            lookup("BINANCE_BASE_URL").unwrap_or_else(|| BinanceClient::DEFAULT_BASE_URL.to_string());

        let default_interval = lookup("CHART_DEFAULT_INTERVAL").unwrap_or_else(|| "1d".to_string());
        if !is_supported_interval(&default_interval) {
            return Err(ConfigError::Invalid {
                key: "CHART_DEFAULT_INTERVAL",
                value: default_interval,
                reason: "not a Binance kline interval".to_string(),
            });
        }

        let kline_limit: u16 = parse_or(&lookup, "CHART_KLINE_LIMIT", 200)?;
        if !(1..=1000).contains(&kline_limit) {
            return Err(ConfigError::Invalid {
                key: "CHART_KLINE_LIMIT",
                value: kline_limit.to_string(),
                reason: "must be between 1 and 1000".to_string(),
            });
        }

        let defaults = ChartStyle::default();
        let chart_style = ChartStyle {
            width: parse_or(&lookup, "CHART_WIDTH", defaults.width)?,
            height: parse_or(&lookup, "CHART_HEIGHT", defaults.height)?,
            ..defaults
        };

        Ok(Self {
            discord_token,
            binance_base_url,
            default_interval,
            kline_limit,
            chart_style,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
