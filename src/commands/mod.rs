pub mod help;
pub mod indicators;

use serenity::builder::{CreateEmbed, CreateMessage};
use serenity::model::channel::Message;
use serenity::prelude::Context;

use crate::utils::check_cooldown;

pub async fn handle_message(ctx: &Context, msg: &Message) {
    if msg.author.bot {
        return;
    }

    // Parse command and arguments
    let parts: Vec<&str> = msg.content.split_whitespace().collect();
    let Some((&command, args)) = parts.split_first() else {
        return;
    };

    if !is_known_command(command) {
        return;
    }

    // Check rate limit before processing command
    if let Err(active) = check_cooldown(msg.author.id.get(), command).await {
        if active.should_warn {
            let _ = msg
                .channel_id
                .send_message(
                    ctx,
                    CreateMessage::default().embed(
                        CreateEmbed::default()
                            .title("Command Cooldown")
                            .description(format!(
                                "⏳ Please wait {} seconds before using this command again.",
                                active.remaining_secs
                            ))
                            .color(0xffa500),
                    ),
                )
                .await;
        }
        return;
    }

    let result = match command {
        "$indicators" | "$ind" | "$chart" => indicators::execute(ctx, msg, args).await,
        "$help" => help::execute(ctx, msg).await,
        _ => return,
    };

    if let Err(e) = result {
        tracing::error!("❌ Error executing command {}: {}", command, e);

        let user_message = user_error_message(e);

        // Send error to user as Discord message embed
        let embed = CreateEmbed::default()
            .title("Command Error")
            .description(user_message)
            .color(0xff0000);

        let _ = msg
            .channel_id
            .send_message(ctx, CreateMessage::default().embed(embed))
            .await;
    }
}

/// Text shown in the error embed. Messages already phrased for the user
/// (leading ❌ or ⚠) pass through untouched.
fn user_error_message(error: String) -> String {
    if error.starts_with('❌') || error.starts_with('⚠') {
        error
    } else if error.contains("429") || error.contains("rate limit") {
        "⚠️ **Rate Limited**: Discord is rate limiting us. Please try again in a moment.".to_string()
    } else if error.contains("HTTP request") {
        "⚠️ **Network Error**: Having trouble connecting to Discord. Please try again.".to_string()
    } else if !error.is_empty() {
        format!("❌ {}", error)
    } else {
        "❌ An error occurred while executing the command.".to_string()
    }
}

fn is_known_command(command: &str) -> bool {
    matches!(command, "$indicators" | "$ind" | "$chart" | "$help")
}
