use tracing::warn;

use crate::{
    config::Config,
    messaging::{
        port::MessagingPort,
        types::{InboundMessage, MessageContext},
    },
    security::is_owner,
};

/// Broadcast pseudo-chat used for status updates; never a command source.
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Turn an inbound message into a [`MessageContext`].
///
/// Returns `None` for events that can never be commands: own messages, status
/// broadcasts, and messages without text. Admin status is only looked up for
/// group chats; a failed lookup counts as "not admin".
pub async fn normalize(
    msg: &InboundMessage,
    cfg: &Config,
    messenger: &dyn MessagingPort,
) -> Option<MessageContext> {
    if msg.from_me || msg.chat_id.0 == STATUS_BROADCAST {
        return None;
    }
    let text = msg.text.as_deref()?.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let is_group_chat = msg.chat_id.is_group();
    let is_sender_owner = is_owner(&msg.sender_id, &cfg.owner_number);

    let is_sender_chat_admin = if is_group_chat {
        match messenger.is_group_admin(&msg.chat_id, &msg.sender_id).await {
            Ok(v) => v,
            Err(e) => {
                warn!(chat = %msg.chat_id, sender = %msg.sender_id, "admin lookup failed: {e}");
                false
            }
        }
    } else {
        false
    };

    Some(MessageContext {
        text,
        sender_id: msg.sender_id.clone(),
        chat_id: msg.chat_id.clone(),
        is_group_chat,
        is_sender_owner,
        is_sender_chat_admin,
        message: Some(msg.message_ref()),
    })
}
