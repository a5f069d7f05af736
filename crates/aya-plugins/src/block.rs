//! Owner commands over the abuse tracker's block-list.

use std::sync::Arc;

use async_trait::async_trait;

use aya_core::{
    domain::SenderId,
    registry::{AccessFlags, CommandContext, CommandHandler, CommandSpec},
};

use crate::add::normalize_number;

const OWNER_ONLY: AccessFlags = AccessFlags {
    owner_only: true,
    group_only: false,
    private_only: false,
    admin_only: false,
};

pub struct Block;
pub struct Unblock;

pub fn block_spec() -> CommandSpec {
    CommandSpec::new("block", Arc::new(Block))
        .aliases(["حظر"])
        .category("owner")
        .description("Ignore every command from a number")
        .usage(".block <phone number>")
        .access(OWNER_ONLY)
}

pub fn unblock_spec() -> CommandSpec {
    CommandSpec::new("unblock", Arc::new(Unblock))
        .aliases(["الغاء_حظر"])
        .category("owner")
        .description("Lift a block")
        .usage(".unblock <phone number>")
        .access(OWNER_ONLY)
}

fn target(args: &[String]) -> Option<SenderId> {
    let number = normalize_number(args.first()?)?;
    Some(SenderId::from_number(&number))
}

async fn list_blocked(ctx: &CommandContext) -> anyhow::Result<()> {
    let blocked = ctx.abuse.blocked_senders().await;
    let text = if blocked.is_empty() {
        "📭 No blocked users.".to_string()
    } else {
        let lines: Vec<String> = blocked.iter().map(|s| format!("• +{}", s.number())).collect();
        format!("🚫 Blocked users:\n{}", lines.join("\n"))
    };
    ctx.reply(text).await?;
    Ok(())
}

#[async_trait]
impl CommandHandler for Block {
    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> anyhow::Result<()> {
        let Some(user) = target(args) else {
            return list_blocked(ctx).await;
        };
        if ctx.cfg.owner_id().as_ref() == Some(&user) {
            ctx.reply("❌ The owner cannot be blocked.").await?;
            return Ok(());
        }
        let text = if ctx.abuse.block(&user).await {
            format!("🚫 +{} is now blocked.", user.number())
        } else {
            format!("ℹ️ +{} was already blocked.", user.number())
        };
        ctx.reply(text).await?;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for Unblock {
    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> anyhow::Result<()> {
        let Some(user) = target(args) else {
            return list_blocked(ctx).await;
        };
        let text = if ctx.abuse.unblock(&user).await {
            format!("✅ +{} is no longer blocked.", user.number())
        } else {
            format!("ℹ️ +{} was not blocked.", user.number())
        };
        ctx.reply(text).await?;
        Ok(())
    }
}
