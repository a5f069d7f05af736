//! Test doubles shared by the workspace's unit tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef, SenderId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{MessageContext, OutgoingMessage, ParticipantUpdate, SendOptions},
    },
    Result,
};

/// A message captured by [`RecordingMessenger`].
#[derive(Clone, Debug)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub payload: OutgoingMessage,
    pub options: SendOptions,
    pub message_ref: MessageRef,
}

/// In-memory `MessagingPort` that records every outbound call.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    admins: Mutex<HashSet<(ChatId, SenderId)>>,
    add_status: Mutex<Option<u16>>,
    fail_sends: Mutex<bool>,
    fail_admin_lookups: Mutex<bool>,
    next_id: AtomicUsize,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_admin(&self, chat_id: &ChatId, sender_id: &SenderId) {
        lock(&self.admins).insert((chat_id.clone(), sender_id.clone()));
    }

    /// Status returned for every participant passed to `add_participants`.
    /// `None` makes the call itself fail.
    pub fn set_add_status(&self, status: Option<u16>) {
        *lock(&self.add_status) = status;
    }

    pub fn fail_sends(&self, fail: bool) {
        *lock(&self.fail_sends) = fail;
    }

    pub fn fail_admin_lookups(&self, fail: bool) {
        *lock(&self.fail_admin_lookups) = fail;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    pub fn texts(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|m| m.payload.text.clone()).collect()
    }

    pub fn clear(&self) {
        lock(&self.sent).clear();
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send_message(
        &self,
        chat_id: &ChatId,
        payload: OutgoingMessage,
        options: SendOptions,
    ) -> Result<MessageRef> {
        if *lock(&self.fail_sends) {
            return Err(Error::External("send failed".to_string()));
        }
        let message_ref = match &payload.edit {
            Some(target) => target.clone(),
            None => MessageRef {
                chat_id: chat_id.clone(),
                message_id: MessageId(format!(
                    "out-{}",
                    self.next_id.fetch_add(1, Ordering::SeqCst)
                )),
            },
        };
        lock(&self.sent).push(SentMessage {
            chat_id: chat_id.clone(),
            payload,
            options,
            message_ref: message_ref.clone(),
        });
        Ok(message_ref)
    }

    async fn is_group_admin(&self, chat_id: &ChatId, sender_id: &SenderId) -> Result<bool> {
        if *lock(&self.fail_admin_lookups) {
            return Err(Error::External("group metadata unavailable".to_string()));
        }
        Ok(lock(&self.admins).contains(&(chat_id.clone(), sender_id.clone())))
    }

    async fn add_participants(
        &self,
        _chat_id: &ChatId,
        participants: &[SenderId],
    ) -> Result<Vec<ParticipantUpdate>> {
        let Some(status) = *lock(&self.add_status) else {
            return Err(Error::External("membership update failed".to_string()));
        };
        Ok(participants
            .iter()
            .map(|p| ParticipantUpdate {
                participant: p.clone(),
                status,
            })
            .collect())
    }
}

/// Private-chat context from a regular user.
pub fn private_ctx(text: &str) -> MessageContext {
    let sender = SenderId("212611111111@s.whatsapp.net".to_string());
    MessageContext {
        text: text.to_string(),
        chat_id: ChatId::from(&sender),
        sender_id: sender,
        is_group_chat: false,
        is_sender_owner: false,
        is_sender_chat_admin: false,
        message: None,
    }
}

/// Group-chat context from a regular (non-admin) member.
pub fn group_ctx(text: &str) -> MessageContext {
    MessageContext {
        chat_id: ChatId("120363000000@g.us".to_string()),
        is_group_chat: true,
        ..private_ctx(text)
    }
}
