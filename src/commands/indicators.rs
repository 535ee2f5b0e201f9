use serenity::all::{CreateAttachment, CreateEmbedFooter};
use serenity::builder::{CreateEmbed, CreateMessage};
use serenity::model::channel::Message;
use serenity::prelude::Context;

use crate::api::binance::{is_supported_interval, SUPPORTED_INTERVALS};
use crate::models::{ChartOutcome, ChartRequest};

/// Parsed `$indicators` arguments
#[derive(Debug, Clone, PartialEq)]
struct ChartArgs {
    symbol: String,
    interval: String,
    indicators: Vec<String>,
}

pub async fn execute(ctx: &Context, msg: &Message, args: &[&str]) -> Result<(), String> {
    tracing::info!("📈 Indicators command called by {} with args: {:?}", msg.author.id, args);

    if args.is_empty() {
        msg.channel_id
            .send_message(ctx, CreateMessage::default().embed(usage_embed()))
            .await
            .map_err(|e| e.to_string())?;
        return Ok(());
    }

    let (pipeline, default_interval) = {
        let data = ctx.data.read().await;
        let pipeline = data
            .get::<crate::ChartPipelineKey>()
            .ok_or("Chart pipeline not initialized".to_string())?
            .clone();
        let config = data
            .get::<crate::BotConfigKey>()
            .ok_or("Bot configuration not loaded".to_string())?;
        (pipeline, config.default_interval.clone())
    };

    let parsed = parse_args(args, &default_interval)?;
    tracing::debug!("Parsed chart request: {:?}", parsed);

    if let Err(e) = msg.channel_id.broadcast_typing(ctx.http.as_ref()).await {
        tracing::warn!("Failed to broadcast typing: {}", e);
    }

    let request = ChartRequest::new(parsed.symbol, parsed.interval, parsed.indicators);
    let outcome = match pipeline.run(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                "Chart failed at {} stage for {} ({}): {}",
                e.stage(),
                e.symbol(),
                e.interval(),
                e
            );
            return Err(e.user_message());
        }
    };

    let file_name = outcome.artifact.file_name(&request.symbol, &request.interval);
    let embed = result_embed(&request, &outcome, &file_name);
    let size = outcome.artifact.bytes.len();
    let message = CreateMessage::default()
        .add_file(CreateAttachment::bytes(outcome.artifact.bytes, file_name.as_str()))
        .embed(embed);

    msg.channel_id
        .send_message(ctx, message)
        .await
        .map_err(|e| format!("Failed to send chart: {}", e))?;

    tracing::info!("✓ Chart {} sent to channel {} ({} bytes)", file_name, msg.channel_id, size);
    Ok(())
}

fn usage_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("📈 Indicators Command")
        .description("Render a candlestick chart for a Binance pair with technical indicators")
        .field("Usage", "`$indicators <PAIR> [interval] [indicators...|all]`", false)
        .field(
            "Examples",
            "`$indicators BTC/USDT` (price and volume only)\n\
             `$indicators ETHUSDT 4h rsi macd`\n\
             `$indicators BTC/USDT 1d Bollinger Bands stochastic`\n\
             `$ind SOLUSDT 1h all`",
            false,
        )
        .field("Indicators", "RSI, MACD, Bollinger Bands (`bb`), Stochastic (`stoch`), `all`", false)
        .field("Intervals", SUPPORTED_INTERVALS.join(", "), false)
        .color(0x00b0f4)
}

fn result_embed(request: &ChartRequest, outcome: &ChartOutcome, file_name: &str) -> CreateEmbed {
    let diagnostics = &outcome.diagnostics;
    let shown = if diagnostics.indicators.is_empty() {
        "None (price only)".to_string()
    } else {
        diagnostics
            .indicators
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut embed = CreateEmbed::default()
        .title(format!("📈 {} ({})", request.symbol, request.interval))
        .field("Indicators", shown, false)
        .image(format!("attachment://{}", file_name))
        .footer(CreateEmbedFooter::new(format!(
            "{} bars from {} rows · {} dropped · {} duplicates removed",
            diagnostics.bars, diagnostics.rows_received, diagnostics.rows_dropped, diagnostics.duplicates_removed
        )))
        .color(0x00ff00);

    if !diagnostics.ignored_indicators.is_empty() {
        embed = embed.field("Ignored", diagnostics.ignored_indicators.join(", "), false);
    }
    let warming_up: Vec<&str> = diagnostics
        .defined_points
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(name, _)| name.as_str())
        .collect();
    if !warming_up.is_empty() {
        embed = embed.field("Not enough history", warming_up.join(", "), false);
    }
    if diagnostics.bars == 0 {
        embed = embed.description("⚠️ No market data returned for this pair and interval.");
    }
    embed
}

fn parse_args(args: &[&str], default_interval: &str) -> Result<ChartArgs, String> {
    let symbol = normalize_pair(args[0])?;

    let (interval, rest) = match args.get(1) {
        Some(candidate) if is_supported_interval(candidate) => (candidate.to_string(), &args[2..]),
        Some(candidate) if looks_like_interval(candidate) => {
            return Err(format!(
                "❌ Unsupported interval `{}`. Use one of: {}",
                candidate,
                SUPPORTED_INTERVALS.join(", ")
            ));
        }
        _ => (default_interval.to_string(), &args[1..]),
    };

    Ok(ChartArgs {
        symbol,
        interval,
        indicators: merge_indicator_tokens(rest),
    })
}

/// `BTC/USDT`, `btc-usdt` and `BTCUSDT` all become `BTCUSDT`
fn normalize_pair(pair: &str) -> Result<String, String> {
    let symbol: String = pair
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_'))
        .collect::<String>()
        .to_uppercase();

    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("❌ Invalid pair `{}`. Use: `BASE/QUOTE` or `BASEQUOTE`", pair));
    }
    Ok(symbol)
}

/// Digits followed by a unit letter, e.g. `2d`
fn looks_like_interval(token: &str) -> bool {
    let digits = token.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && token.len() > digits && token[digits..].chars().all(|c| c.is_ascii_alphabetic())
}

/// Rejoin multi-word names split by whitespace ("Bollinger Bands")
fn merge_indicator_tokens(tokens: &[&str]) -> Vec<String> {
    let mut names = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let joins_next = tokens[i].eq_ignore_ascii_case("bollinger")
            && tokens.get(i + 1).is_some_and(|next| next.eq_ignore_ascii_case("bands"));
        if joins_next {
            names.push(format!("{} {}", tokens[i], tokens[i + 1]));
            i += 2;
        } else {
            names.push(tokens[i].to_string());
            i += 1;
        }
    }
    names
}
