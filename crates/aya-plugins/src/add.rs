use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use aya_core::{
    domain::SenderId,
    messaging::types::OutgoingMessage,
    registry::{AccessFlags, CommandContext, CommandHandler, CommandSpec},
};

/// Country code applied to numbers given in local form.
pub const COUNTRY_CODE: &str = "212";

static NON_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9]").expect("Invalid non-digit regex pattern"));

pub struct AddMember;

pub fn spec() -> CommandSpec {
    CommandSpec::new("add", Arc::new(AddMember))
        .aliases(["اضف", "انضمام"])
        .category("group")
        .description("Add a member to the group")
        .usage(".add <phone number>")
        .cooldown_secs(10)
        .access(AccessFlags {
            group_only: true,
            admin_only: true,
            ..Default::default()
        })
}

/// Strip everything but digits and make sure the number carries the country code.
///
/// `0612345678` → `212612345678`, `+212 612-345678` → `212612345678`.
pub fn normalize_number(raw: &str) -> Option<String> {
    let digits = NON_DIGITS.replace_all(raw, "").into_owned();
    if digits.is_empty() {
        return None;
    }
    if digits.starts_with(COUNTRY_CODE) {
        return Some(digits);
    }
    let local = digits.strip_prefix('0').unwrap_or(&digits);
    Some(format!("{COUNTRY_CODE}{local}"))
}

fn status_reply(status: u16, number: &str) -> String {
    match status {
        200 => format!("✅ Member added!\n\n📱 Number: +{number}"),
        403 => "❌ This number cannot be added (it may be blocked or private).".to_string(),
        408 => "❌ The request timed out.".to_string(),
        409 => "❌ This member is already in the group.".to_string(),
        500 => "❌ Server error.".to_string(),
        503 => "❌ The service is currently unavailable.".to_string(),
        _ => "❌ Adding the member failed.".to_string(),
    }
}

#[async_trait]
impl CommandHandler for AddMember {
    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> anyhow::Result<()> {
        let Some(number) = args.first().and_then(|a| normalize_number(a)) else {
            ctx.reply(format!(
                "❌ Please provide a phone number.\n\n📌 Example: {}add 2126XXXXXXXX",
                ctx.cfg.prefix
            ))
            .await?;
            return Ok(());
        };

        let user = SenderId::from_number(&number);
        let chat = &ctx.message.chat_id;
        let updates = match ctx
            .messenger
            .add_participants(chat, std::slice::from_ref(&user))
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(chat = %chat, participant = %user, "add participant failed: {e}");
                ctx.reply(
                    "❌ Something went wrong while adding the member.\n\
                     🔍 Check the number and the member's privacy settings.",
                )
                .await?;
                return Ok(());
            }
        };

        let status = updates
            .iter()
            .find(|u| u.participant == user)
            .or(updates.first())
            .map(|u| u.status)
            .unwrap_or(500);
        info!(chat = %chat, participant = %user, status, "add participant");

        let mut reply = OutgoingMessage::text(status_reply(status, &number));
        if status == 200 {
            reply = reply.with_mentions(vec![user]);
        }
        ctx.send(reply).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::invoke;
    use aya_core::testing::{group_ctx, RecordingMessenger};

    #[test]
    fn normalizes_local_and_international_forms() {
        assert_eq!(normalize_number("0612345678").as_deref(), Some("212612345678"));
        assert_eq!(normalize_number("612345678").as_deref(), Some("212612345678"));
        assert_eq!(normalize_number("+212 612-345-678").as_deref(), Some("212612345678"));
        assert_eq!(normalize_number("212612345678").as_deref(), Some("212612345678"));
        assert_eq!(normalize_number("abc"), None);
        assert_eq!(normalize_number(""), None);
    }

    #[tokio::test]
    async fn adds_member_and_mentions_them() {
        let messenger = Arc::new(RecordingMessenger::new());
        messenger.set_add_status(Some(200));
        invoke(&messenger, &spec(), group_ctx(".add 0612345678"), &["0612345678"])
            .await
            .unwrap();

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].payload.text.contains("+212612345678"));
        assert_eq!(
            sent[0].payload.mentions,
            vec![SenderId::from_number("212612345678")]
        );
    }

    #[tokio::test]
    async fn maps_status_codes_to_replies() {
        for (status, needle) in [
            (403, "cannot be added"),
            (408, "timed out"),
            (409, "already in the group"),
            (500, "Server error"),
            (503, "unavailable"),
            (418, "failed"),
        ] {
            let messenger = Arc::new(RecordingMessenger::new());
            messenger.set_add_status(Some(status));
            invoke(&messenger, &spec(), group_ctx(".add 612345678"), &["612345678"])
                .await
                .unwrap();
            let texts = messenger.texts();
            assert!(texts[0].contains(needle), "{status}: {texts:?}");
            assert!(messenger.sent()[0].payload.mentions.is_empty());
        }
    }

    #[tokio::test]
    async fn missing_number_replies_with_usage() {
        let messenger = Arc::new(RecordingMessenger::new());
        invoke(&messenger, &spec(), group_ctx(".add"), &[])
            .await
            .unwrap();
        assert!(messenger.texts()[0].contains(".add 2126XXXXXXXX"));
    }

    #[tokio::test]
    async fn transport_failure_is_answered_not_raised() {
        let messenger = Arc::new(RecordingMessenger::new());
        messenger.set_add_status(None);
        invoke(&messenger, &spec(), group_ctx(".add 0612345678"), &["0612345678"])
            .await
            .unwrap();
        assert!(messenger.texts()[0].contains("Something went wrong"));
    }
}
