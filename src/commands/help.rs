use serenity::builder::CreateEmbed;
use serenity::model::channel::Message;
use serenity::prelude::Context;

use crate::api::binance::SUPPORTED_INTERVALS;
use crate::models::IndicatorKind;
use crate::utils::ratelimit::COOLDOWN_SECONDS;

pub async fn execute(ctx: &Context, msg: &Message) -> Result<(), String> {
    let indicators = IndicatorKind::ALL
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ");

    let embed = CreateEmbed::default()
        .title("📖 Indicator Chart Bot Help")
        .description("Candlestick charts with technical indicators for Binance spot pairs.")
        .color(0x00b0f4)
        .field("🎯 General", "`$help` - Show this help message", false)
        .field(
            "📊 Charts",
            "`$indicators <PAIR> [interval] [indicators...|all]` - Render a chart\n\
             Aliases: `$ind`, `$chart`",
            false,
        )
        .field("📐 Indicators", format!("{}, or `all`", indicators), false)
        .field("⏱️ Intervals", SUPPORTED_INTERVALS.join(", "), false)
        .field(
            "⚡ Rate Limiting",
            format!("{}-second cooldown per command per user", COOLDOWN_SECONDS),
            false,
        );

    msg.channel_id
        .send_message(ctx, serenity::builder::CreateMessage::default().embed(embed))
        .await
        .map_err(|e| format!("Failed to send help message: {}", e))?;

    Ok(())
}
