use crate::domain::{ChatId, MessageId, MessageRef, SenderId};

/// Raw inbound event as delivered by the transport.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    Message(InboundMessage),
    ParticipantsAdded {
        chat_id: ChatId,
        participants: Vec<SenderId>,
    },
}

#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub sender_id: SenderId,
    pub message_id: MessageId,
    pub text: Option<String>,
    /// Sent by the bot's own account.
    pub from_me: bool,
}

impl InboundMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id.clone(),
            message_id: self.message_id.clone(),
        }
    }
}

/// Normalized view of one inbound message. Built once, read-only during dispatch.
#[derive(Clone, Debug)]
pub struct MessageContext {
    pub text: String,
    pub sender_id: SenderId,
    pub chat_id: ChatId,
    pub is_group_chat: bool,
    pub is_sender_owner: bool,
    pub is_sender_chat_admin: bool,
    /// The triggering message, quoted by replies when present.
    pub message: Option<MessageRef>,
}

/// Outgoing message payload.
#[derive(Clone, Debug, Default)]
pub struct OutgoingMessage {
    pub text: String,
    /// Users to mention (notify) with this message.
    pub mentions: Vec<SenderId>,
    /// Replace the content of a previously sent message instead of sending a new one.
    pub edit: Option<MessageRef>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_mentions(mut self, mentions: Vec<SenderId>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn editing(mut self, target: MessageRef) -> Self {
        self.edit = Some(target);
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    pub quoted: Option<MessageRef>,
}

impl SendOptions {
    pub fn quoting(msg: Option<&MessageRef>) -> Self {
        Self {
            quoted: msg.cloned(),
        }
    }
}

/// Per-participant result of a membership update. `status` follows HTTP-like
/// codes (`200` ok, `403` refused, `409` already a member, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantUpdate {
    pub participant: SenderId,
    pub status: u16,
}
