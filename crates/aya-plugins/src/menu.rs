use std::sync::Arc;

use async_trait::async_trait;

use aya_core::registry::{CommandContext, CommandHandler, CommandRegistry, CommandSpec};

pub struct Menu;

pub fn spec() -> CommandSpec {
    CommandSpec::new("menu", Arc::new(Menu))
        .aliases(["help", "اوامر"])
        .category("general")
        .description("List the available commands")
        .usage(".menu")
        .cooldown_secs(5)
}

/// Render the command list grouped by category.
///
/// Owner-only commands are hidden from everyone but the owner.
pub fn render(registry: &CommandRegistry, bot_name: &str, prefix: &str, owner: bool) -> String {
    let mut out = format!("🤖 *{bot_name}* commands\n");
    let mut current: Option<&str> = None;

    let specs = registry.list();
    for spec in specs.iter().filter(|s| owner || !s.access.owner_only) {
        if current != Some(spec.category.as_str()) {
            out.push_str(&format!("\n╭── *{}*\n", spec.category.to_uppercase()));
            current = Some(spec.category.as_str());
        }
        out.push_str(&format!("│ {prefix}{}", spec.name));
        if !spec.aliases.is_empty() {
            out.push_str(&format!(" ({})", spec.aliases.join(", ")));
        }
        if !spec.description.is_empty() {
            out.push_str(&format!(" · {}", spec.description));
        }
        out.push('\n');
    }
    out
}

#[async_trait]
impl CommandHandler for Menu {
    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> anyhow::Result<()> {
        let text = render(
            &ctx.registry,
            &ctx.cfg.bot_name,
            &ctx.cfg.prefix,
            ctx.message.is_sender_owner,
        );
        ctx.reply(text).await?;
        Ok(())
    }
}
