//! User-facing reply texts for dispatch denials and failures.

pub const OWNER_ONLY: &str = "❌ This command is reserved for the bot owner.";
pub const GROUP_ONLY: &str = "❌ This command can only be used in groups.";
pub const PRIVATE_ONLY: &str = "❌ This command can only be used in private chat.";
pub const ADMIN_ONLY: &str = "❌ This command is for group admins only.";
pub const HANDLER_FAILED: &str = "❌ Something went wrong while running this command.";

pub fn cooldown(secs: u64) -> String {
    format!("⏳ Please wait {secs} seconds before using this command again.")
}

pub fn spam(secs: u64) -> String {
    format!("⚠️ Slow down! You are sending commands too fast. Try again in {secs} seconds.")
}
