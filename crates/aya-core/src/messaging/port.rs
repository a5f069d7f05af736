use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, SenderId},
    messaging::types::{OutgoingMessage, ParticipantUpdate, SendOptions},
    Result,
};

/// Outbound side of the chat transport.
///
/// Timeouts and retries are the implementation's business; the core never
/// wraps these calls.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_message(
        &self,
        chat_id: &ChatId,
        payload: OutgoingMessage,
        options: SendOptions,
    ) -> Result<MessageRef>;

    async fn is_group_admin(&self, chat_id: &ChatId, sender_id: &SenderId) -> Result<bool>;

    async fn add_participants(
        &self,
        chat_id: &ChatId,
        participants: &[SenderId],
    ) -> Result<Vec<ParticipantUpdate>>;
}
