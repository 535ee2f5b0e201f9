use std::sync::Arc;

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::binance::BinanceClient;
use crate::config::BotConfig;
use crate::services::chart_service::PlottersRenderer;
use crate::services::pipeline::ChartPipeline;

mod api;
mod commands;
mod config;
mod models;
mod services;
mod utils;

struct Handler;

pub struct ChartPipelineKey;

impl TypeMapKey for ChartPipelineKey {
    type Value = Arc<ChartPipeline<BinanceClient, PlottersRenderer>>;
}

pub struct BotConfigKey;

impl TypeMapKey for BotConfigKey {
    type Value = Arc<BotConfig>;
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        commands::handle_message(&ctx, &msg).await;
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected to {} guild(s)", ready.user.name, ready.guilds.len());
    }
}

fn env_filter() -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["indicator_chart_bot=debug", "serenity=warn"] {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Invalid log directive {}: {}", directive, e),
        }
    }
    filter
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("🤖 Starting indicator chart bot...");

    let config = match BotConfig::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    info!(
        "Market data from {} ({} klines, default interval {}), charts {}x{}",
        config.binance_base_url,
        config.kline_limit,
        config.default_interval,
        config.chart_style.width,
        config.chart_style.height
    );

    let pipeline = Arc::new(ChartPipeline::new(
        BinanceClient::with_base_url(config.binance_base_url.clone(), config.kline_limit),
        PlottersRenderer::new(config.chart_style.clone()),
    ));

    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MESSAGES;

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(Handler)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create client: {}", e);
            return;
        }
    };

    // Share the pipeline and configuration with command handlers
    {
        let mut data = client.data.write().await;
        data.insert::<ChartPipelineKey>(pipeline);
        data.insert::<BotConfigKey>(config);
    }

    if let Err(e) = client.start().await {
        error!("Client error: {}", e);
    }
}
