pub mod client;
pub mod models;

pub use client::BinanceClient;
pub use models::{is_supported_interval, SUPPORTED_INTERVALS};
