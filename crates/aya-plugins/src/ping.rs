use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Local;
use tokio::time::Instant;

use aya_core::{
    messaging::types::OutgoingMessage,
    registry::{CommandContext, CommandHandler, CommandSpec},
};

pub struct Ping;

pub fn spec() -> CommandSpec {
    CommandSpec::new("ping", Arc::new(Ping))
        .aliases(["بنج", "سرعة"])
        .category("general")
        .description("Check how fast the bot responds")
        .usage(".ping")
        .cooldown_secs(3)
}

/// Speed rating shown next to the measured round trip.
pub fn rate(latency: Duration) -> &'static str {
    match latency.as_millis() {
        0..=299 => "🟢 Very fast",
        300..=499 => "🟡 Good",
        500..=799 => "🟠 Acceptable",
        _ => "🔴 Slow",
    }
}

#[async_trait]
impl CommandHandler for Ping {
    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> anyhow::Result<()> {
        let start = Instant::now();
        let placeholder = ctx.reply("🏓 *Pong!* measuring...").await?;
        let latency = start.elapsed();

        let text = format!(
            "╭───「 *Response time* 」───\n\
             │ 🏓 *Ping:* {}ms\n\
             │ 📊 *Status:* {}\n\
             │ ⏱️ *Time:* {}\n\
             ╰─────────────────────\n\n\
             🤖 *{}* is ready!",
            latency.as_millis(),
            rate(latency),
            Local::now().format("%H:%M:%S"),
            ctx.cfg.bot_name,
        );
        ctx.send(OutgoingMessage::text(text).editing(placeholder))
            .await?;
        Ok(())
    }
}
